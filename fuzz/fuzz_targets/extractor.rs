#![no_main]

use libfuzzer_sys::fuzz_target;

use telepost::channel::post::{PostContext, extract_post};
use telepost::dom;
use telepost::highlight::HeuristicHighlighter;

fuzz_target!(|data: &[u8]| {
    // Convert raw bytes to string, handling invalid UTF-8 gracefully
    let html = String::from_utf8_lossy(data).to_string();

    let document = dom::parse_document(&html);
    let ctx = PostContext {
        channel: "durov",
        host: "t.me",
        static_proxy: "/static/",
        highlighter: &HeuristicHighlighter,
    };

    // The extractor should never panic regardless of input
    let _ = extract_post(&document, 0, &ctx);
});
