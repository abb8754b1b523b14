use std::collections::HashMap;

use convrt::config::{
    ENV_AUTOTUNE_CACHE_RESULTS, ENV_AUTOTUNE_LEVEL, ENV_DETERMINISTIC_OPS, ENV_TUNING_RELAXED,
};
use convrt::{DebugOptions, RuntimeOptions, TuningExclusion};

fn options_from(vars: &[(&str, &str)]) -> RuntimeOptions {
    let vars = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect::<HashMap<_, _>>();
    RuntimeOptions::from_lookup(|name| vars.get(name).cloned())
}

#[test]
fn unset_variables_keep_defaults() {
    let options = options_from(&[]);
    assert_eq!(options, RuntimeOptions::default());
    assert_eq!(options.tuning_exclusion, TuningExclusion::Exclusive);
    assert_eq!(options.debug, DebugOptions::default());
    assert_eq!(options.debug.autotune_level, 4);
    assert!(options.debug.autotune_cache_results);
}

#[test]
fn boolean_variables_accept_common_spellings() {
    for value in ["1", "true", "YES", " on "] {
        let options = options_from(&[(ENV_TUNING_RELAXED, value), (ENV_DETERMINISTIC_OPS, value)]);
        assert_eq!(options.tuning_exclusion, TuningExclusion::Relaxed, "{value:?}");
        assert!(options.debug.deterministic_ops, "{value:?}");
    }

    let options = options_from(&[
        (ENV_TUNING_RELAXED, "0"),
        (ENV_AUTOTUNE_CACHE_RESULTS, "off"),
    ]);
    assert_eq!(options.tuning_exclusion, TuningExclusion::Exclusive);
    assert!(!options.debug.autotune_cache_results);
}

#[test]
fn autotune_level_is_parsed_and_clamped() {
    assert_eq!(
        options_from(&[(ENV_AUTOTUNE_LEVEL, "2")]).debug.autotune_level,
        2
    );
    assert_eq!(
        options_from(&[(ENV_AUTOTUNE_LEVEL, "9")]).debug.autotune_level,
        4
    );
    assert_eq!(
        options_from(&[(ENV_AUTOTUNE_LEVEL, "fast")]).debug.autotune_level,
        4
    );
}

#[test]
fn blank_values_are_ignored() {
    let options = options_from(&[
        (ENV_AUTOTUNE_CACHE_RESULTS, "  "),
        (ENV_AUTOTUNE_LEVEL, ""),
    ]);
    assert!(options.debug.autotune_cache_results);
    assert_eq!(options.debug.autotune_level, 4);
}

#[test]
fn tuning_exclusion_can_be_overridden() {
    let options = RuntimeOptions::default().with_tuning_exclusion(TuningExclusion::Relaxed);
    assert_eq!(options.tuning_exclusion, TuningExclusion::Relaxed);
}
