//! Image analysis requests.
//!
//! Each analysis is framed by one of a fixed set of critic voices, drawn at
//! random, and sent to the engine as a single multimodal user message.

use crate::backend::{ChatMessage, CompletionRequest, ImageDetail, ImageUrl};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use muaddib_core::RandomSource;

/// Text delivered when analysis fails.
pub const ANALYSIS_FALLBACK: &str = "抱歉，我無法分析這張圖片。";

/// Near-deterministic sampling for analyses.
pub const ANALYSIS_TEMPERATURE: f32 = 0.01;

/// Instructions framing an analysis, grouped by register.
pub const ANALYSIS_INSTRUCTIONS: [&str; 10] = [
    // Art and culture
    "你是一位藝術評論家，請用細膩且富有層次的語言來分析圖片，\
     從構圖、色彩、光影、意象到情感表達等方面切入，\
     並鼓勵使用者思考作品的藝術價值。",
    "你是一位歷史學家，請用縝密且深遠的角度來分析圖片，\
     從時代背景、服飾風格、建築細節到藝術風潮等方面切入，\
     並鼓勵使用者思考這幅作品如何與歷史對話。",
    // Creative
    "你是一位詩人，請用柔和且富有意境的語言來分析圖片，\
     從色彩的流動、線條的節奏、畫面的韻律到意象的深度等方面切入，\
     並鼓勵使用者思考這幅作品如何觸動人心。",
    "你是一位小說家，請用生動且富有敘事感的方式來分析圖片，\
     從畫面氛圍、人物關係、環境細節到隱藏的故事線索等方面切入，\
     並鼓勵使用者思考這張圖像背後可能蘊含的劇情發展。",
    // Professional
    "你是一位心理學家，請用細膩且深入人心的方式來分析圖片，\
     從顏色象徵、構圖平衡、人物表情到視覺暗示等方面切入，\
     並鼓勵使用者思考作品如何反映內在情感與心理狀態。",
    "你是一位哲學家，請用深思且充滿思辨的方式來分析圖片，\
     從存在與虛無、對比與和諧、現象與本質等方面切入，\
     並鼓勵使用者思考這張圖片如何反映世界與個人的關係。",
    // Observational
    "你是一位偵探，請用銳利且邏輯縝密的方式來分析圖片，\
     從光影投射、物件擺放、細微線索到可能的動機等方面切入，\
     並鼓勵使用者思考這張圖片是否隱藏著不為人知的秘密。",
    "你是一位時尚設計師，請用敏銳且趨勢導向的方式來分析圖片，\
     從服飾剪裁、配色搭配、布料質感到流行元素等方面切入，\
     並鼓勵使用者思考這幅作品如何影響時尚潮流。",
    // Sensory
    "你是一位料理評論家，請用感官豐富且充滿味覺想像的方式來分析圖片，\
     從色彩與質感的搭配、視覺上的層次感到畫面是否呈現出食物的美味度，\
     並鼓勵使用者思考這張圖片如何喚起味覺共鳴。",
    "你是一位音樂家，請用旋律般流暢且充滿節奏感的方式來分析圖片，\
     從畫面動態、色彩的協調性、線條的律動感到整體視覺的節奏感等方面切入，\
     並鼓勵使用者思考這張圖片如何與聲音產生共鳴。",
];

/// Encodes JPEG bytes as a `data:` URL.
#[must_use]
pub fn jpeg_data_url(image: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(image))
}

/// Builds a free-text analysis request for `image` with a random instruction.
#[must_use]
pub fn analysis_request(image: &[u8], random: &dyn RandomSource) -> CompletionRequest {
    let instruction = ANALYSIS_INSTRUCTIONS[random.pick_index(ANALYSIS_INSTRUCTIONS.len())];
    let message = ChatMessage::user_image(
        ImageUrl {
            url: jpeg_data_url(image),
            detail: ImageDetail::High,
        },
        instruction,
    );
    CompletionRequest::new(vec![message]).with_temperature(ANALYSIS_TEMPERATURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ContentPart, MessageContent};
    use muaddib_core::FixedRandom;

    #[test]
    fn data_url_is_base64_jpeg() {
        assert_eq!(jpeg_data_url(b"abc"), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn analysis_request_carries_image_then_instruction() {
        let request = analysis_request(b"abc", &FixedRandom(0.95));

        assert!(request.has_image());
        assert!(request.output_schema.is_none());
        assert_eq!(request.temperature, Some(ANALYSIS_TEMPERATURE));

        let MessageContent::Parts(parts) = &request.messages[0].content else {
            panic!("expected multimodal content");
        };
        assert!(matches!(
            &parts[0],
            ContentPart::ImageUrl { image_url } if image_url.detail == ImageDetail::High
        ));
        assert!(matches!(
            &parts[1],
            ContentPart::Text { text } if text == ANALYSIS_INSTRUCTIONS[9]
        ));
    }
}
