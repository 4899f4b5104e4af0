use super::*;
use chrono::{Duration, TimeZone};
use reelwalk_core::MediaType;

fn media() -> StoryMediaDescriptor {
    StoryMediaDescriptor {
        story_id: "3301".into(),
        url: "https://cdn.example/a.jpg".into(),
        media_type: MediaType::Image,
        width: Some(1080),
        height: Some(1920),
        owner_id: "1789".into(),
        owner_username: Some("alice".into()),
        variants: Vec::new(),
        can_reply: Some(true),
        can_react: Some(true),
        is_ad: false,
        is_paid_partnership: false,
        reshare_source: None,
        external_attribution: false,
        taken_at: None,
    }
}

fn profile(auto_reply_enabled: bool) -> ProfileRef {
    ProfileRef {
        id: 1,
        username: "alice".into(),
        external_user_id: None,
        auto_reply_enabled,
    }
}

fn label(label: &str, confidence: f64) -> AnalysisLabel {
    AnalysisLabel {
        label: label.into(),
        confidence,
    }
}

#[test]
fn unknown_owner_is_out_of_network() {
    assert_eq!(network_gate(None), Gate::Skip(SkipReason::ProfileNotInNetwork));
    assert_eq!(network_gate(Some(&profile(true))), Gate::Continue);
}

#[test]
fn retry_gate_holds_until_window_expires() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let state = ProfileInteractionState::unavailable(now, "replies_unavailable", 3, false);

    assert_eq!(
        retry_gate(Some(&state), now + Duration::days(2)),
        Gate::Skip(SkipReason::InteractionRetryPending)
    );
    assert_eq!(retry_gate(Some(&state), now + Duration::days(3)), Gate::Continue);
    assert_eq!(retry_gate(None, now), Gate::Continue);
}

#[test]
fn single_weak_ad_signal_is_not_enough() {
    let mut m = media();
    m.is_paid_partnership = true;
    assert_eq!(ad_gate(&m, DomAdSignals::default()), Gate::Continue);

    let cta = DomAdSignals {
        sponsored_label: false,
        cta_link: true,
    };
    assert_eq!(ad_gate(&m, cta), Gate::Skip(SkipReason::Advertisement));
}

#[test]
fn api_ad_marker_alone_is_an_ad() {
    let mut m = media();
    m.is_ad = true;
    assert_eq!(ad_score(&m, DomAdSignals::default()), 2);
    assert_eq!(ad_gate(&m, DomAdSignals::default()), Gate::Skip(SkipReason::Advertisement));
}

#[test]
fn reshares_are_external() {
    let mut m = media();
    m.reshare_source = Some("brand".into());
    assert_eq!(attribution_gate(&m), Gate::Skip(SkipReason::ExternalAttribution));
    assert_eq!(attribution_gate(&media()), Gate::Continue);
}

#[test]
fn mismatched_media_is_an_integrity_error() {
    assert!(media_identity("3301", &media()).is_ok());
    assert!(matches!(
        media_identity("9999", &media()),
        Err(EngineError::StoryMismatch { .. })
    ));
}

#[test]
fn auto_reply_only_requires_opt_in() {
    assert_eq!(
        auto_reply_gate(true, &profile(false)),
        Gate::Skip(SkipReason::AutoReplyDisabled)
    );
    assert_eq!(auto_reply_gate(true, &profile(true)), Gate::Continue);
    assert_eq!(auto_reply_gate(false, &profile(false)), Gate::Continue);
}

#[test]
fn tag_gate_ignores_low_confidence_labels() {
    let blocked = vec!["text".to_owned(), "screenshot".to_owned()];
    assert_eq!(
        tag_gate(&[label("Text", 0.8)], &blocked),
        Gate::Skip(SkipReason::ContentTagBlocked)
    );
    assert_eq!(tag_gate(&[label("Text", 0.3)], &blocked), Gate::Continue);
    assert_eq!(tag_gate(&[label("Beach", 0.9)], &blocked), Gate::Continue);
}

#[test]
fn confident_labels_are_lowercased() {
    let labels = [label("Beach", 0.9), label("Dog", 0.1)];
    assert_eq!(confident_labels(&labels), vec!["beach".to_owned()]);
}
