//! Markup sanitization for generator output.
//!
//! ARCHITECTURAL RULE: resume markup from the Content Generator is
//! semi-trusted and MUST pass through `sanitize_html` before it is stored or
//! returned to a render path. No other module may shortcut this.

/// Strips script-bearing and otherwise unsafe content from generated resume
/// markup while keeping the structural and inline-style markup resumes use.
pub fn sanitize_html(input: &str) -> String {
    ammonia::Builder::default()
        .add_generic_attributes(&["style", "class"])
        .clean(input)
        .to_string()
}
