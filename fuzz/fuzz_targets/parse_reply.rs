#![no_main]

use libfuzzer_sys::fuzz_target;
use moderation_contract::Thresholds;
use toxicity_oracle::{parse_assessment, ReplyOptions};

fuzz_target!(|data: &[u8]| {
    let Ok(reply) = std::str::from_utf8(data) else {
        return;
    };

    let assessment = parse_assessment(reply);
    assert!(assessment.score <= 100);
    if !assessment.rated {
        assert_eq!(assessment.score, 0);
    }
    let _ = Thresholds::TEXT.decide(assessment.score);

    if let Ok(options) = ReplyOptions::from_json(reply) {
        assert!(!options.polite.trim().is_empty());
    }
});
