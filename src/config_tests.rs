// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::label_errors::ConfigurationError;
    use crate::test_support::LogCapture;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn set(value: &str) -> DesiredLabel {
        DesiredLabel::Set(value.to_string())
    }

    // ============================================================================
    // Token Parsing
    // ============================================================================

    #[test]
    fn test_parse_key_value_token() {
        assert_eq!(
            parse_label_token("disktype=ssd"),
            Some(("disktype".to_string(), set("ssd")))
        );
    }

    #[test]
    fn test_parse_empty_value_is_valid() {
        assert_eq!(
            parse_label_token("node-role.kubernetes.io/control-plane="),
            Some(("node-role.kubernetes.io/control-plane".to_string(), set("")))
        );
    }

    #[test]
    fn test_parse_trailing_marker_on_value_is_removal() {
        assert_eq!(
            parse_label_token("gpu=nvidia-"),
            Some(("gpu".to_string(), DesiredLabel::Remove))
        );
        assert_eq!(
            parse_label_token("gpu=-"),
            Some(("gpu".to_string(), DesiredLabel::Remove))
        );
    }

    #[test]
    fn test_parse_bare_removal_token() {
        assert_eq!(
            parse_label_token("extra-label.removable-"),
            Some(("extra-label.removable".to_string(), DesiredLabel::Remove))
        );
    }

    #[test]
    fn test_parse_malformed_tokens() {
        assert_eq!(parse_label_token("too=many=equals"), None);
        assert_eq!(parse_label_token("not_enough_equals"), None);
        assert_eq!(parse_label_token("-"), None);
        assert_eq!(parse_label_token("=a=b"), None);
    }

    #[test]
    fn test_parse_empty_key_with_one_equals_is_kept() {
        assert_eq!(
            parse_label_token("=value"),
            Some((String::new(), set("value")))
        );
        assert_eq!(
            parse_label_token("=value-"),
            Some((String::new(), DesiredLabel::Remove))
        );
    }

    // ============================================================================
    // Configuration String Parsing
    // ============================================================================

    #[test]
    fn test_parse_labels_skips_malformed_tokens() {
        let desired =
            parse_labels("too=many=equals not_enough_equals valid=ok", false).unwrap();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired.get("valid"), Some(&set("ok")));
    }

    #[test]
    fn test_parse_labels_warns_for_each_malformed_token() {
        let logs = LogCapture::default();
        let desired = tracing::subscriber::with_default(logs.subscriber(), || {
            parse_labels("too=many=equals not_enough_equals valid=ok", false)
        })
        .unwrap();

        assert_eq!(desired.len(), 1);
        let output = logs.contents();
        assert!(output.contains("Skipping malformed label: too=many=equals."));
        assert!(output.contains("Skipping malformed label: not_enough_equals."));
        assert_eq!(output.matches("Skipping malformed label:").count(), 2);
        assert_eq!(
            output.lines().filter(|line| line.contains("WARN")).count(),
            2
        );
    }

    #[test]
    fn test_parse_labels_keeps_empty_key_token() {
        let desired = parse_labels("=value ok=1", false).unwrap();
        assert_eq!(desired.len(), 2);
        assert_eq!(desired.get(""), Some(&set("value")));
        assert_eq!(desired.get("ok"), Some(&set("1")));

        assert_eq!(parse_labels("=value ok=1", true).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_labels_strict_rejects_first_malformed_token() {
        let err = parse_labels("valid=ok too=many=equals not_enough_equals", true).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MalformedLabel {
                token: "too=many=equals".to_string()
            }
        );
    }

    #[test]
    fn test_parse_labels_strict_accepts_well_formed_input() {
        let desired = parse_labels("a=1 b= c-", true).unwrap();
        assert_eq!(desired.len(), 3);
        assert!(desired.wants_set("a"));
        assert!(desired.wants_set("b"));
        assert!(!desired.wants_set("c"));
    }

    #[test]
    fn test_parse_labels_last_token_wins() {
        let desired = parse_labels("zone=a zone=b", false).unwrap();
        assert_eq!(desired.get("zone"), Some(&set("b")));

        let desired = parse_labels("zone=a zone-", false).unwrap();
        assert_eq!(desired.get("zone"), Some(&DesiredLabel::Remove));
    }

    #[test]
    fn test_parse_labels_empty_and_extra_whitespace() {
        assert!(parse_labels("", true).unwrap().is_empty());
        assert!(parse_labels("   \t\n ", true).unwrap().is_empty());

        let desired = parse_labels("  a=1\t\tb=2\n", true).unwrap();
        assert_eq!(desired.len(), 2);
    }

    #[test]
    fn test_set_labels_excludes_removals() {
        let desired = parse_labels("a=1 b- c=3", false).unwrap();
        let expected: BTreeMap<String, String> = [("a", "1"), ("c", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(desired.set_labels(), expected);
    }

    proptest! {
        /// Parsing the whole string equals parsing each token on its own and
        /// keeping those with exactly one `=`, plus bare `key-` removals.
        #[test]
        fn test_parse_matches_per_token_parse(
            tokens in prop::collection::vec(
                prop_oneof![
                    ("[a-z0-9./]{0,8}", "[a-z0-9]{0,6}-?")
                        .prop_map(|(k, v)| format!("{k}={v}")),
                    "[a-z]{1,6}",
                    "[a-z]{1,6}-",
                    "[a-z]{0,3}=[a-z]{0,3}=[a-z]{0,3}",
                ],
                0..12,
            )
        ) {
            let text = tokens.join(" ");
            let parsed = parse_labels(&text, false).unwrap();

            let mut expected = DesiredLabels::new();
            for token in &tokens {
                let parts: Vec<&str> = token.split('=').collect();
                match parts.as_slice() {
                    [key, value] if value.ends_with('-') => {
                        expected.insert(*key, DesiredLabel::Remove);
                    }
                    [key, value] => expected.insert(*key, set(value)),
                    [key] if key.len() > 1 && key.ends_with('-') => {
                        expected.insert(&key[..key.len() - 1], DesiredLabel::Remove);
                    }
                    _ => {}
                }
            }

            prop_assert_eq!(parsed, expected);
        }
    }

    // ============================================================================
    // Settings
    // ============================================================================

    #[test]
    fn test_settings_defaults() {
        let settings = ReconcilerSettings::default();
        assert_eq!(settings.labels, "");
        assert_eq!(settings.kubectl_path, PathBuf::from("/snap/bin/kubectl"));
        assert_eq!(settings.timeout_secs, 180);
        assert_eq!(settings.retry_interval_secs, 1);
        assert!(!settings.strict);
        assert!(settings.application.is_none());
    }

    #[test]
    fn test_settings_from_partial_yaml() {
        let settings = ReconcilerSettings::from_yaml(
            r"
labels: disktype=ssd gpu-
strict: true
application: kubernetes-worker
cloud: aws
timeout-secs: 30
",
        )
        .unwrap();

        assert_eq!(settings.labels, "disktype=ssd gpu-");
        assert!(settings.strict);
        assert_eq!(settings.application.as_deref(), Some("kubernetes-worker"));
        assert_eq!(settings.cloud.as_deref(), Some("aws"));
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.state_file, PathBuf::from("/var/lib/node-labeler/state.json"));
    }

    #[test]
    fn test_settings_reject_zero_retry_interval() {
        let settings = ReconcilerSettings {
            retry_interval_secs: 0,
            ..ReconcilerSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(ReconcilerSettings::default().validate().is_ok());

        let err = ReconcilerSettings::from_yaml("retry-interval-secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("retry-interval-secs"));
    }

    #[test]
    fn test_settings_reject_unknown_fields() {
        assert!(ReconcilerSettings::from_yaml("lables: typo=1\n").is_err());
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "labels: a=1\nnode-name: worker-0\n").unwrap();

        let settings = ReconcilerSettings::from_file(&path).unwrap();
        assert_eq!(settings.node_name.as_deref(), Some("worker-0"));
        assert_eq!(settings.desired_labels().unwrap().get("a"), Some(&set("1")));
    }

    #[test]
    fn test_settings_from_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ReconcilerSettings::from_file(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_settings_retry_policy() {
        let settings = ReconcilerSettings {
            timeout_secs: 5,
            retry_interval_secs: 2,
            ..ReconcilerSettings::default()
        };
        let policy = settings.retry_policy();
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_settings_strict_mode_surfaces_error() {
        let settings = ReconcilerSettings {
            labels: "this=isn't=valid".to_string(),
            strict: true,
            ..ReconcilerSettings::default()
        };
        assert!(settings.desired_labels().is_err());
    }
}
