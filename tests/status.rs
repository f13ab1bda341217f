use ocwatch::status::{LocationLookup, LocationRules, RawStatus, StatusNormalizer};

fn normalize(description: &str, details: Option<&str>, state: &str, revive: &str) -> String {
    StatusNormalizer::standard()
        .expect("rules")
        .normalize(&RawStatus {
            description,
            details,
            state,
            revive_setting: revive,
        })
}

#[test]
fn documented_examples() {
    assert_eq!(
        normalize("Traveling to Mexico", None, "Traveling", "Everyone"),
        "[Mexico] - Going"
    );
    assert_eq!(
        normalize("Returning to Torn from Switzerland", None, "Traveling", "Everyone"),
        "[Switzerland] - Returning"
    );
    assert_eq!(
        normalize("In hospital for 4 mins", Some("Mugged by X"), "Hospital", "Everyone"),
        "[Hospital] Mugged - Revives: ALL"
    );
}

#[test]
fn custom_rules_replace_the_alias_table() {
    let rules = LocationRules::new(
        vec![("atlantis".to_string(), "Lost City".to_string())],
        r"(?i)in (?:a |an )?([a-z\s]+) hospital",
        &[r"(?i)(?:Traveling to) ([a-z\s]+)"],
    )
    .expect("rules");

    assert_eq!(rules.locate("Traveling to Atlantis"), Some("Lost City".to_string()));
    assert_eq!(rules.locate("Traveling to nowhere"), Some("Nowhere".to_string()));
    assert_eq!(rules.locate("Hiding out in Cuba"), None);

    let token = StatusNormalizer::new(rules).normalize(&RawStatus {
        description: "In Atlantis",
        details: None,
        state: "Abroad",
        revive_setting: "",
    });
    assert_eq!(token, "[Lost City] - Idle");
}
