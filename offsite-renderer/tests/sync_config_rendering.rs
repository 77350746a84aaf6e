//! Rendering the sync tool config from a Secret Bundle.

use std::collections::BTreeMap;

use offsite_core::{keys, settings::SyncToolSettings, ConnectionProfile, SecretBundle};
use offsite_renderer::{ConfigContext, TemplateEngine};

fn reference_bundle() -> SecretBundle {
    SecretBundle::from_iter([
        (keys::SOURCE_ACCESS_KEY_ID, "a"),
        (keys::SOURCE_SECRET_ACCESS_KEY, "b"),
        (keys::SOURCE_ENDPOINT, "s3.src"),
        (keys::DESTINATION_ACCESS_KEY_ID, "c"),
        (keys::DESTINATION_SECRET_ACCESS_KEY, "d"),
        (keys::DESTINATION_ENDPOINT, "s3.dst"),
        (keys::ARCHIVE_AFTER_DAYS, "30"),
        (keys::DELETE_AFTER_DAYS, "90"),
        (keys::SOURCE_BUCKET, "prod-data"),
    ])
}

/// Minimal INI reader: section name → key → value.
fn sections(text: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut out: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(name.to_string());
            out.entry(name.to_string()).or_default();
            continue;
        }
        let (k, v) = line.split_once(" = ").expect("key = value line");
        let section = current.clone().expect("key before any section");
        out.entry(section)
            .or_default()
            .insert(k.to_string(), v.to_string());
    }
    out
}

fn render(bundle: &SecretBundle, settings: &SyncToolSettings) -> String {
    let (src, dst) = ConnectionProfile::pair_from_bundle(bundle).expect("profiles");
    let ctx = ConfigContext::new(&src, &dst, settings).expect("context");
    TemplateEngine::new(None)
        .expect("engine")
        .render_sync_config(&ctx)
        .expect("render")
}

#[test]
fn reference_bundle_yields_exactly_two_profiles() {
    let text = render(&reference_bundle(), &SyncToolSettings::default());
    let parsed = sections(&text);

    assert_eq!(parsed.len(), 2, "sections: {:?}", parsed.keys());
    let src = &parsed["SOURCE"];
    let dst = &parsed["DESTINATION"];

    for (section, id, secret, endpoint) in [(src, "a", "b", "s3.src"), (dst, "c", "d", "s3.dst")] {
        assert_eq!(section["type"], "s3");
        assert_eq!(section["provider"], "IBMCOS");
        assert_eq!(section["env_auth"], "false");
        assert_eq!(section["access_key_id"], id);
        assert_eq!(section["secret_access_key"], secret);
        assert_eq!(section["endpoint"], endpoint);
        assert_eq!(section.len(), 6);
    }
}

#[test]
fn values_survive_verbatim_for_varied_inputs() {
    let samples = [
        ("AKIA0123456789", "wJalr/XUtnFEMI+K7MDENG=", "https://s3.eu-de.cloud-object-storage.appdomain.cloud"),
        ("x", "key with spaces", "http://127.0.0.1:9000"),
        ("ünïcødé", "$(rm -rf /);`id`", "s3.private.us-south.cloud-object-storage.appdomain.cloud"),
    ];
    for (id, secret, endpoint) in samples {
        let bundle = SecretBundle::from_iter([
            (keys::SOURCE_ACCESS_KEY_ID, id),
            (keys::SOURCE_SECRET_ACCESS_KEY, secret),
            (keys::SOURCE_ENDPOINT, endpoint),
            (keys::DESTINATION_ACCESS_KEY_ID, id),
            (keys::DESTINATION_SECRET_ACCESS_KEY, secret),
            (keys::DESTINATION_ENDPOINT, endpoint),
        ]);
        let parsed = sections(&render(&bundle, &SyncToolSettings::default()));
        for name in ["SOURCE", "DESTINATION"] {
            assert_eq!(parsed[name]["access_key_id"], id);
            assert_eq!(parsed[name]["secret_access_key"], secret);
            assert_eq!(parsed[name]["endpoint"], endpoint);
        }
    }
}

#[test]
fn custom_provider_and_profile_names() {
    let settings = SyncToolSettings {
        provider: "Minio".into(),
        source_profile: "COS_SOURCE".into(),
        destination_profile: "COS_DESTINATION".into(),
        ..SyncToolSettings::default()
    };
    let parsed = sections(&render(&reference_bundle(), &settings));
    assert_eq!(parsed["COS_SOURCE"]["provider"], "Minio");
    assert_eq!(parsed["COS_DESTINATION"]["endpoint"], "s3.dst");
}
