use std::collections::BTreeSet;

use crate::units::UnitDescriptor;

/// Segment introducing a feature sub-tree.
pub const FEATURE_SEGMENT: &str = "feat";
/// Final segment of a feature state topic.
pub const STATE_SEGMENT: &str = "$state";

pub const COMMAND_SUFFIX: &str = "cmd";
pub const DATA_SUFFIX: &str = "data";
pub const ACK_SUFFIX: &str = "ack";
pub const STATUS_SUFFIX: &str = "status";

const UNIT_SUFFIXES: [&str; 4] = [COMMAND_SUFFIX, DATA_SUFFIX, ACK_SUFFIX, STATUS_SUFFIX];

/// Kind of non-feature traffic on a unit's topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicClass {
    /// Generic telemetry or an explicit alert marker.
    Data,
    /// Threshold status report.
    Status,
    /// Acknowledgement (reserved, no-op).
    Ack,
}

/// Strips every leading and trailing `/`.
///
/// ```
/// use unitvisor::topics::normalize;
///
/// assert_eq!(normalize("//cps/x/u1/"), "cps/x/u1");
/// assert_eq!(normalize(normalize("/a/")), normalize("/a/"));
/// ```
#[inline]
pub fn normalize(topic: &str) -> &str {
    topic.trim_matches('/')
}

/// Returns `(without_leading_slash, with_leading_slash)` for a topic.
pub fn variants(topic: &str) -> (String, String) {
    let bare = normalize(topic);
    (bare.to_string(), format!("/{bare}"))
}

/// Joins a base and a suffix with exactly one `/` between them.
pub fn join(base: &str, suffix: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}

/// Canonical state topic of a feature: `<base>/feat/<key>/$state`.
pub fn state_topic(base: &str, key: &str) -> String {
    format!(
        "{}/{FEATURE_SEGMENT}/{key}/{STATE_SEGMENT}",
        normalize(base)
    )
}

/// Path of `incoming` below `base`, both normalized.
///
/// Returns `Some("")` when the topics are equal and `None` when `incoming` is not
/// inside `base` on a segment boundary (`a/bc` is not inside `a/b`). An empty base
/// owns nothing.
pub fn relative_path<'a>(base: &str, incoming: &'a str) -> Option<&'a str> {
    let base = normalize(base);
    if base.is_empty() {
        return None;
    }
    let rest = normalize(incoming).strip_prefix(base)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix('/').map(|r| r.trim_start_matches('/'))
}

/// Returns the feature key when `incoming` is exactly `<base>/feat/<key>/$state`.
///
/// Any other shape (`feat/<key>` alone, extra segments before or after) is no match.
///
/// ```
/// use unitvisor::topics::match_feature_state;
///
/// assert_eq!(match_feature_state("a/b", "a/b/feat/soldagem/$state"), Some("soldagem"));
/// assert_eq!(match_feature_state("a/b", "a/b/feat/soldagem"), None);
/// assert_eq!(match_feature_state("a/b", "a/b/x/feat/soldagem/$state"), None);
/// ```
pub fn match_feature_state<'a>(base: &str, incoming: &'a str) -> Option<&'a str> {
    let rel = relative_path(base, incoming)?;
    let mut parts = rel.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(FEATURE_SEGMENT), Some(key), Some(STATE_SEGMENT), None) if !key.is_empty() => {
            Some(key)
        }
        _ => None,
    }
}

/// Classifies a topic below `base` by its segments.
///
/// A reserved word counts when it is the last segment or an internal segment of the
/// path relative to the base, so unit names containing `data` never match.
/// Precedence is `data`, then `status`, then `ack`.
pub fn classify(base: &str, incoming: &str) -> Option<TopicClass> {
    let rel = relative_path(base, incoming)?;
    if rel.is_empty() {
        return None;
    }
    let has = |word: &str| rel.split('/').any(|seg| seg == word);
    if has(DATA_SUFFIX) {
        Some(TopicClass::Data)
    } else if has(STATUS_SUFFIX) {
        Some(TopicClass::Status)
    } else if has(ACK_SUFFIX) {
        Some(TopicClass::Ack)
    } else {
        None
    }
}

/// Every topic a unit must be observed on, in both slash variants.
///
/// Base, base+`cmd|data|ack|status`, and each configured feature state topic.
/// Empty when the unit has no base topic.
pub fn subscription_topics_for(unit: &UnitDescriptor) -> BTreeSet<String> {
    let mut topics = BTreeSet::new();
    let (bare, slashed) = variants(&unit.base_topic);
    if bare.is_empty() {
        return topics;
    }

    for suffix in UNIT_SUFFIXES {
        topics.insert(join(&bare, suffix));
        topics.insert(join(&slashed, suffix));
    }
    topics.insert(bare);
    topics.insert(slashed);

    for feature in &unit.features {
        if normalize(&feature.state_topic).is_empty() {
            continue;
        }
        let (bare, slashed) = variants(&feature.state_topic);
        topics.insert(bare);
        topics.insert(slashed);
    }
    topics
}
