//! The fixed attack-handle vocabulary and its human-readable labels.
//!
//! The handle list is closed: extraction prompts instruct the model to use
//! these exact spellings, and the merger renders unknown handles by
//! title-casing them rather than rejecting the event.

/// Canonical machine handles, in document order of the prompt that defines
/// them. Used by tests and by anything that wants to validate a handle.
pub const ATTACK_HANDLES: [&str; 55] = [
    // People
    "children",
    "women",
    "minorities",
    "immigrants_refugees",
    "lgbtq",
    "workers",
    "poor",
    "veterans",
    "disabled",
    "sick_vulnerable",
    // Nation
    "truth",
    "science",
    "education",
    "culture_art",
    "public_memory",
    "faith",
    "decency",
    "hope",
    // Institutions
    "presidency",
    "courts",
    "congress",
    "civil_service",
    "justice_dept",
    "intelligence",
    "military",
    "diplomacy",
    "ig_watchdogs",
    "public_service",
    // Information
    "press",
    "information",
    "whistleblowers",
    "internet",
    "knowledge",
    "reality",
    // World
    "allies",
    "global_democracy",
    "trade",
    "peace",
    "climate_cooperation",
    "idea_of_america",
    // Republic
    "constitution",
    "separation_of_powers",
    "rule_of_law",
    "emoluments",
    "birthright_citizenship",
    "amendment_22",
    "amendment_25",
    "peaceful_transfer",
    "union",
    // Future
    "environment",
    "economy",
    "public_health",
    "civic_education",
    "future",
    "reality_itself",
];

/// Human-readable label for one handle, or a title-cased fallback for
/// handles outside the canonical list.
pub fn humanize_handle(handle: &str) -> String {
    let label = match handle {
        "children" => "Children",
        "women" => "Women",
        "minorities" => "Minorities",
        "immigrants_refugees" => "Immigrants & Refugees",
        "lgbtq" => "LGBTQ+ People",
        "workers" => "Workers",
        "poor" => "The Poor",
        "veterans" => "Veterans",
        "disabled" => "People with Disabilities",
        "sick_vulnerable" => "The Medically Vulnerable",
        "truth" => "Truth & Honesty",
        "science" => "Science & Evidence",
        "education" => "Education",
        "culture_art" => "Culture & Art",
        "public_memory" => "Public Memory",
        "faith" => "Faith & Religion",
        "decency" => "Decency & Ethics",
        "hope" => "Hope & Optimism",
        "presidency" => "The Presidency",
        "courts" => "The Courts",
        "congress" => "Congress",
        "civil_service" => "Civil Service",
        "justice_dept" => "Justice Department",
        "intelligence" => "Intelligence Community",
        "military" => "The Military",
        "diplomacy" => "Diplomacy",
        "ig_watchdogs" => "Inspectors General & Watchdogs",
        "public_service" => "Public Service",
        "press" => "Free Press",
        "information" => "Information & Transparency",
        "whistleblowers" => "Whistleblowers",
        "internet" => "Internet & Digital Freedom",
        "knowledge" => "Knowledge & Data Integrity",
        "reality" => "Reality",
        "allies" => "Allies & Partnerships",
        "global_democracy" => "Global Democracy",
        "trade" => "Trade & Commerce",
        "peace" => "Peace & Stability",
        "climate_cooperation" => "Climate Cooperation",
        "idea_of_america" => "The Idea of America",
        "constitution" => "The Constitution",
        "separation_of_powers" => "Separation of Powers",
        "rule_of_law" => "Rule of Law",
        "emoluments" => "Emoluments & Self-Enrichment",
        "birthright_citizenship" => "Birthright Citizenship",
        "amendment_22" => "22nd Amendment (Term Limits)",
        "amendment_25" => "25th Amendment (Capacity & Succession)",
        "peaceful_transfer" => "Peaceful Transfer of Power",
        "union" => "Federal Union",
        "environment" => "Environment",
        "economy" => "Economy",
        "public_health" => "Public Health",
        "civic_education" => "Civic Education",
        "future" => "Future Generations",
        "reality_itself" => "Reality Itself",
        _ => return title_case_fallback(handle),
    };
    label.to_string()
}

fn title_case_fallback(handle: &str) -> String {
    handle
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a handle list for the text log; "None" when the list is empty.
pub fn humanize_attacks(handles: &[String]) -> String {
    if handles.is_empty() {
        return "None".to_string();
    }
    handles
        .iter()
        .map(|h| humanize_handle(h))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every handle whose label differs from the title-case fallback; a
    // missing or misspelled match arm falls through and fails the exact
    // comparison. (Handles absent here have a label identical to the
    // fallback, where a fall-through is unobservable and harmless.)
    const DIVERGENT_LABELS: &[(&str, &str)] = &[
        ("immigrants_refugees", "Immigrants & Refugees"),
        ("lgbtq", "LGBTQ+ People"),
        ("poor", "The Poor"),
        ("disabled", "People with Disabilities"),
        ("sick_vulnerable", "The Medically Vulnerable"),
        ("truth", "Truth & Honesty"),
        ("science", "Science & Evidence"),
        ("culture_art", "Culture & Art"),
        ("faith", "Faith & Religion"),
        ("decency", "Decency & Ethics"),
        ("hope", "Hope & Optimism"),
        ("presidency", "The Presidency"),
        ("courts", "The Courts"),
        ("justice_dept", "Justice Department"),
        ("intelligence", "Intelligence Community"),
        ("military", "The Military"),
        ("ig_watchdogs", "Inspectors General & Watchdogs"),
        ("press", "Free Press"),
        ("information", "Information & Transparency"),
        ("internet", "Internet & Digital Freedom"),
        ("knowledge", "Knowledge & Data Integrity"),
        ("allies", "Allies & Partnerships"),
        ("trade", "Trade & Commerce"),
        ("peace", "Peace & Stability"),
        ("idea_of_america", "The Idea of America"),
        ("constitution", "The Constitution"),
        ("separation_of_powers", "Separation of Powers"),
        ("rule_of_law", "Rule of Law"),
        ("emoluments", "Emoluments & Self-Enrichment"),
        ("amendment_22", "22nd Amendment (Term Limits)"),
        ("amendment_25", "25th Amendment (Capacity & Succession)"),
        ("peaceful_transfer", "Peaceful Transfer of Power"),
        ("union", "Federal Union"),
        ("future", "Future Generations"),
    ];

    #[test]
    fn every_canonical_handle_has_a_label() {
        for h in ATTACK_HANDLES {
            assert!(!humanize_handle(h).is_empty(), "no label for {h}");
        }
    }

    #[test]
    fn divergent_labels_do_not_fall_through_to_title_casing() {
        for &(handle, label) in DIVERGENT_LABELS {
            assert_eq!(humanize_handle(handle), label);
            assert_ne!(label, title_case_fallback(handle), "{handle} belongs in the fallback set");
        }
    }

    #[test]
    fn handle_list_is_the_documented_size() {
        assert_eq!(ATTACK_HANDLES.len(), 55);
    }

    #[test]
    fn unknown_handles_are_title_cased() {
        assert_eq!(humanize_handle("ballot_access"), "Ballot Access");
    }

    #[test]
    fn empty_list_renders_none() {
        assert_eq!(humanize_attacks(&[]), "None");
        assert_eq!(
            humanize_attacks(&["courts".into(), "rule_of_law".into()]),
            "The Courts, Rule of Law"
        );
    }
}
