use fake_news_scorer::classification::{self, ZeroShotRequest};
use fake_news_scorer::settings;
use fake_news_scorer::translation::{self, TranslationRequest};

#[test]
fn translation_system_prompt_snapshot() {
    let request = TranslationRequest {
        text: "Le gouvernement a annoncé une hausse des impôts.".to_string(),
        source_lang: "fr".to_string(),
        target_lang: translation::TARGET_LANGUAGE.to_string(),
        max_new_tokens: settings::DEFAULT_MAX_NEW_TOKENS,
    };
    let prompt = translation::render_system_prompt(&request, translation::TOOL_NAME).unwrap();
    insta::assert_snapshot!(prompt);
}

#[test]
fn classification_system_prompt_snapshot() {
    let request = ZeroShotRequest {
        texts: vec![
            "The government announced a tax increase.".to_string(),
            "Taxes will be abolished next week.".to_string(),
        ],
        candidate_labels: vec![
            classification::TRUE_LABEL.to_string(),
            classification::FALSE_LABEL.to_string(),
        ],
        hypothesis_template: settings::DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
    };
    let prompt =
        classification::render_system_prompt(&request, classification::TOOL_NAME).unwrap();
    insta::assert_snapshot!(prompt);
}
