// src/utils/html.rs

/// Cleans editor-supplied question text with ammonia.
///
/// Safe inline markup (<b>, <i>, <sub>) survives; <script> and <style> are
/// dropped together with their content, event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}
