use dropwatch_core::ElementFacts;
use scraper::{Html, Selector};

/// Snapshot of the first element matching `selector`, or `None` when nothing
/// matches.
///
/// The label is the element's visible text, trimmed and flattened to one
/// line; class and href come through verbatim so the classifier sees exactly
/// what the page served.
pub fn find_element(body: &str, selector: &Selector) -> Option<ElementFacts> {
    let doc = Html::parse_document(body);
    let element = doc.select(selector).next()?;
    let label = element
        .text()
        .collect::<String>()
        .trim()
        .replace('\n', "");
    let style_class = element.value().attr("class").unwrap_or("").to_string();
    let action_target = element.value().attr("href").unwrap_or("").to_string();
    Some(ElementFacts {
        label,
        style_class,
        action_target,
    })
}
