#![no_main]

use libfuzzer_sys::fuzz_target;
use moderation_contract::{Content, ModerationRequest};

fuzz_target!(|parts: (Option<String>, Option<String>, Option<String>, Option<String>)| {
    let (text, image_url, image_data, context) = parts;
    let has_image = image_url.as_deref().is_some_and(|v| !v.trim().is_empty())
        || image_data.as_deref().is_some_and(|v| !v.trim().is_empty());

    if let Ok(request) = ModerationRequest::from_parts(text, image_url, image_data, context) {
        assert_eq!(matches!(request.content, Content::Image(_)), has_image);
    }
});
