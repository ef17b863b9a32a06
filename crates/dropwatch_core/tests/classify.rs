use dropwatch_core::{classify, ElementFacts, Markers, Status};

fn facts(label: &str, style_class: &str, action_target: &str) -> ElementFacts {
    ElementFacts {
        label: label.to_string(),
        style_class: style_class.to_string(),
        action_target: action_target.to_string(),
    }
}

#[test]
fn absent_element_is_not_found() {
    assert_eq!(classify(None, &Markers::default()), Status::NotFound);
}

#[test]
fn enabled_confirmation_purchase_is_buyable() {
    let facts = facts("購入する", "buy-button", "/posts/1003/charge_confirmation");
    assert_eq!(classify(Some(&facts), &Markers::default()), Status::Buyable);
}

#[test]
fn disabled_element_is_sold_out_regardless_of_label() {
    // Some disabled buttons keep the purchase word and the confirmation
    // href; the disabled class must win.
    let facts = facts(
        "購入する",
        "buy-button disabled",
        "/posts/1003/charge_confirmation",
    );
    assert_eq!(classify(Some(&facts), &Markers::default()), Status::SoldOut);
}

#[test]
fn sold_out_label_without_disabled_class_is_sold_out() {
    let facts = facts("売り切れてます", "buy-button", "#");
    assert_eq!(classify(Some(&facts), &Markers::default()), Status::SoldOut);
}

#[test]
fn non_confirmation_target_is_never_buyable() {
    let facts = facts("購入する", "buy-button", "/posts/1003/details");
    assert_eq!(classify(Some(&facts), &Markers::default()), Status::Unknown);
}

#[test]
fn purchase_marker_missing_is_unknown() {
    let facts = facts("カートに入れる", "buy-button", "/posts/1003/charge_confirmation");
    assert_eq!(classify(Some(&facts), &Markers::default()), Status::Unknown);
}

#[test]
fn unmatched_element_is_unknown() {
    let facts = facts("coming soon", "buy-button", "#");
    assert_eq!(classify(Some(&facts), &Markers::default()), Status::Unknown);
}

#[test]
fn custom_markers_drive_the_table() {
    let markers = Markers {
        confirm_pattern: "checkout".to_string(),
        purchase_marker: "Buy now".to_string(),
        sold_out_marker: "Sold out".to_string(),
        disabled_marker: "is-disabled".to_string(),
    };
    let buyable = facts("Buy now", "cta", "/items/7/checkout");
    assert_eq!(classify(Some(&buyable), &markers), Status::Buyable);
    let disabled = facts("Buy now", "cta is-disabled", "/items/7/checkout");
    assert_eq!(classify(Some(&disabled), &markers), Status::SoldOut);
}
