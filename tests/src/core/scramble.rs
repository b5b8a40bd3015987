use shroud_core::scramble::{IdentifierCategory, ScrambleMode, Scrambler, ScramblerConfig, ScramblerSet};
use std::collections::HashSet;

fn scrambler(category: IdentifierCategory) -> Scrambler {
    Scrambler::new(category, ScramblerConfig::default())
}

#[test]
fn test_scramble_is_memoized() {
    let s = scrambler(IdentifierCategory::Variable);
    let first = s.scramble("total");
    assert_eq!(s.scramble("total"), first);
    assert_ne!(first, "total");
    assert_eq!(s.len(), 1);
}

#[test]
fn test_case_insensitive_categories_fold() {
    let functions = scrambler(IdentifierCategory::Function);
    assert_eq!(functions.scramble("Foo"), functions.scramble("foo"));

    let variables = scrambler(IdentifierCategory::Variable);
    assert_ne!(variables.scramble("Foo"), variables.scramble("foo"));
}

#[test]
fn test_generated_names_are_distinct() {
    for mode in [ScrambleMode::Identifier, ScrambleMode::Hex, ScrambleMode::Numeric] {
        let s = Scrambler::new(
            IdentifierCategory::Class,
            ScramblerConfig {
                mode,
                target_length: 2,
                ..Default::default()
            },
        );
        let names: HashSet<String> = (0..500)
            .map(|i| s.scramble(&format!("Name{i}")).to_ascii_lowercase())
            .collect();
        assert_eq!(names.len(), 500, "collision in {mode} mode");
    }
}

#[test]
fn test_ignored_names_stay_and_are_never_generated() {
    let s = Scrambler::new(
        IdentifierCategory::Function,
        ScramblerConfig {
            ignore: vec!["keep".to_string()],
            ignore_prefixes: vec!["wp_".to_string()],
            target_length: 4,
            ..Default::default()
        },
    );
    assert_eq!(s.scramble("keep"), "keep");
    assert_eq!(s.scramble("KEEP"), "KEEP");
    assert_eq!(s.scramble("wp_query"), "wp_query");
    assert!(s.lookup("keep").is_none());
    for i in 0..300 {
        let generated = s.scramble(&format!("f{i}"));
        assert!(!s.should_ignore(&generated), "generated ignored name {generated}");
    }
}

#[test]
fn test_unscramble_inverts_scramble() {
    let s = scrambler(IdentifierCategory::Property);
    for name in ["id", "createdAt", "owner_id"] {
        let generated = s.scramble(name);
        assert_eq!(s.unscramble(&generated).as_deref(), Some(name));
    }
    assert!(s.unscramble("never_generated").is_none());
}

#[test]
fn test_state_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = |_| ScramblerConfig {
        seed: 9,
        ..Default::default()
    };
    let saved = ScramblerSet::new(config);
    let originals: Vec<String> = (0..50).map(|i| format!("var{i}")).collect();
    let before: Vec<String> = originals
        .iter()
        .map(|n| saved.get(IdentifierCategory::Variable).scramble(n))
        .collect();
    saved.save_dir(dir.path()).unwrap();

    let restored = ScramblerSet::new(config);
    restored.load_dir(dir.path()).unwrap();
    let variables = restored.get(IdentifierCategory::Variable);
    let after: Vec<String> = originals.iter().map(|n| variables.scramble(n)).collect();
    assert_eq!(before, after);

    let fresh = variables.scramble("brand_new");
    assert!(!before.contains(&fresh));
    assert!(restored.get(IdentifierCategory::Class).is_empty());
}

#[test]
fn test_state_of_other_category_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let classes = scrambler(IdentifierCategory::Class);
    classes.scramble("User");
    let path = dir.path().join("state.json");
    classes.save(&path).unwrap();

    let functions = scrambler(IdentifierCategory::Function);
    assert!(functions.load(&path).is_err());
    assert!(functions.load(&dir.path().join("missing.json")).is_ok());
}

/// Hex names always start with `a`-`f`; ignoring those prefixes leaves nothing to generate.
fn saturated_hex(category: IdentifierCategory) -> Scrambler {
    Scrambler::new(
        category,
        ScramblerConfig {
            mode: ScrambleMode::Hex,
            target_length: 1,
            ignore_prefixes: ["a", "b", "c", "d", "e", "f"].map(String::from).to_vec(),
            ..Default::default()
        },
    )
}

#[test]
fn test_exhausted_generation_falls_back_to_original() {
    let s = saturated_hex(IdentifierCategory::Function);
    assert_eq!(s.scramble("zeta"), "zeta");
    assert_eq!(s.lookup("ZETA").as_deref(), Some("zeta"));
    assert_eq!(s.unscramble("zeta").as_deref(), Some("zeta"));
    assert_eq!(s.len(), 1);
}

#[test]
fn test_fallback_never_takes_an_assigned_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("function.json");
    let first = scrambler(IdentifierCategory::Function);
    let (original, generated) = (0..100)
        .map(|i| {
            let name = format!("helper{i}");
            let generated = first.scramble(&name);
            (name, generated)
        })
        .find(|(_, generated)| !generated.starts_with(['a', 'b', 'c', 'd', 'e', 'f']))
        .unwrap();
    first.save(&path).unwrap();

    let second = saturated_hex(IdentifierCategory::Function);
    second.load(&path).unwrap();
    let fallback = second.scramble(&generated);
    assert_eq!(fallback, format!("{generated}_1"));
    assert_eq!(second.unscramble(&generated).as_deref(), Some(original.as_str()));
    assert_eq!(second.unscramble(&fallback).as_deref(), Some(generated.as_str()));
}

#[test]
fn test_class_likes_share_one_namespace() {
    let set = ScramblerSet::new(|_| ScramblerConfig {
        mode: ScrambleMode::Numeric,
        target_length: 1,
        ..Default::default()
    });
    let mut seen = HashSet::new();
    for category in [
        IdentifierCategory::Class,
        IdentifierCategory::Interface,
        IdentifierCategory::Trait,
    ] {
        for i in 0..40 {
            let generated = set.get(category).scramble(&format!("Shape{i}"));
            assert!(seen.insert(generated.to_ascii_lowercase()), "{category}: {generated}");
        }
    }
}
