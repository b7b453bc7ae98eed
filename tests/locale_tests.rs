use agrimarket_gate::{config::LocaleConfig, locale::Locales};

fn locales() -> Locales {
    Locales::new(&LocaleConfig {
        supported: vec!["en".to_string(), "fr".to_string(), "sw".to_string()],
        default: "en".to_string(),
    })
    .unwrap()
}

#[test]
fn test_locale_of_requires_a_whole_segment() {
    let locales = locales();

    assert_eq!(locales.locale_of("/en"), Some("en"));
    assert_eq!(locales.locale_of("/fr/marketplace"), Some("fr"));
    assert_eq!(locales.locale_of("/sw/"), Some("sw"));
    assert_eq!(locales.locale_of("/english"), None);
    assert_eq!(locales.locale_of("/de/marketplace"), None);
    assert_eq!(locales.locale_of("/"), None);
    assert_eq!(locales.locale_of(""), None);
}

#[test]
fn test_negotiate_prefers_highest_quality() {
    let locales = locales();

    assert_eq!(locales.negotiate(Some("sw;q=0.4, fr;q=0.8, en;q=0.6")), "fr");
    assert_eq!(locales.negotiate(Some("fr, sw")), "fr");
    // Equal weights keep header order.
    assert_eq!(locales.negotiate(Some("sw;q=0.5, fr;q=0.5")), "sw");
}

#[test]
fn test_negotiate_matches_region_tags_by_language() {
    let locales = locales();

    assert_eq!(locales.negotiate(Some("fr-CA")), "fr");
    assert_eq!(locales.negotiate(Some("SW-KE,en;q=0.2")), "sw");
    assert_eq!(locales.negotiate(Some("de-DE, en-GB;q=0.7")), "en");
}

#[test]
fn test_negotiate_falls_back_to_default() {
    let locales = locales();

    assert_eq!(locales.negotiate(None), "en");
    assert_eq!(locales.negotiate(Some("")), "en");
    assert_eq!(locales.negotiate(Some("de, ja;q=0.5")), "en");
    assert_eq!(locales.negotiate(Some("*")), "en");
    // Zero weight means "not acceptable".
    assert_eq!(locales.negotiate(Some("fr;q=0, de")), "en");
    // Unparsable weights are ignored rather than trusted.
    assert_eq!(locales.negotiate(Some("fr;q=high")), "en");
}

#[test]
fn test_negotiate_is_deterministic() {
    let locales = locales();
    let header = Some("sw-TZ;q=0.9, fr;q=0.9, en;q=0.1");

    let first = locales.negotiate(header).to_string();
    for _ in 0..10 {
        assert_eq!(locales.negotiate(header), first);
    }
    assert_eq!(first, "sw");
}
