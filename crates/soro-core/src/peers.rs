//! Peer matcher: weighted roster scoring, group relevance, wait estimates.

use std::collections::HashSet;
use std::sync::Arc;

use crate::knowledge::KnowledgeBase;
use crate::messages::{MatchedPeer, PeerMatchResponse, PeerSupportRequest, SupportRequestType};
use crate::models::{ExperienceLevel, GroupSession, PeerRecord, Urgency};

const EXPERTISE_WEIGHT: f64 = 0.40;
const AVAILABILITY_WEIGHT: f64 = 0.25;
const EXPERIENCE_WEIGHT: f64 = 0.20;
const URGENCY_BONUS: f64 = 0.15;

/// Peers must score strictly above this to be offered.
pub const MIN_PEER_SCORE: f64 = 0.3;
const MAX_PEERS: usize = 3;
const MAX_GROUPS: usize = 2;
const MIN_KEYWORD_CHARS: usize = 3;

/// What the user is looking for.
#[derive(Debug, Clone)]
pub struct PeerQuery {
    pub desired_state: String,
    pub support_type: SupportRequestType,
    pub availability: Vec<String>,
    pub expertise_areas: Vec<String>,
    pub urgency: Urgency,
}

impl From<&PeerSupportRequest> for PeerQuery {
    fn from(req: &PeerSupportRequest) -> Self {
        Self {
            desired_state: req.current_state.clone(),
            support_type: req.support_type,
            availability: req.availability.clone(),
            expertise_areas: req.expertise_areas.clone(),
            urgency: req.urgency,
        }
    }
}

pub struct PeerMatcher {
    kb: Arc<KnowledgeBase>,
}

impl PeerMatcher {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// Up to three peers scoring above [`MIN_PEER_SCORE`], best first.
    pub fn match_peers(&self, query: &PeerQuery) -> Vec<MatchedPeer> {
        let mut scored: Vec<(f64, &PeerRecord)> = self
            .kb
            .peers
            .iter()
            .map(|peer| (peer_score(peer, query), peer))
            .filter(|(score, _)| *score > MIN_PEER_SCORE)
            .map(|(score, peer)| (round2(score), peer))
            .collect();
        // ranked on the published two-decimal score; ties keep roster order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(MAX_PEERS);

        scored
            .into_iter()
            .map(|(score, peer)| MatchedPeer {
                peer: peer.clone(),
                score,
                match_reason: match_reason(peer, &query.expertise_areas),
                response_time: response_time(peer.experience_level, query.urgency),
            })
            .collect()
    }

    /// Up to two groups whose topic and focus share keywords with the user's state and areas.
    pub fn match_groups(&self, desired_state: &str, expertise_areas: &[String]) -> Vec<GroupSession> {
        let keywords: Vec<String> = desired_state
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .chain(expertise_areas.iter().map(|a| a.to_lowercase()))
            .filter(|k| k.chars().count() > MIN_KEYWORD_CHARS)
            .collect();

        let mut relevant: Vec<(usize, &GroupSession)> = self
            .kb
            .groups
            .iter()
            .map(|group| {
                let text = group.relevance_text();
                let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count();
                (hits, group)
            })
            .filter(|(hits, _)| *hits >= 1)
            .collect();
        relevant.sort_by(|a, b| b.0.cmp(&a.0));
        relevant.truncate(MAX_GROUPS);
        relevant.into_iter().map(|(_, g)| g.clone()).collect()
    }

    /// Full PSN answer to a peer-support request.
    pub fn respond(&self, req: &PeerSupportRequest) -> PeerMatchResponse {
        let query = PeerQuery::from(req);
        let matched_peers = self.match_peers(&query);
        let recommended_groups = self.match_groups(&query.desired_state, &query.expertise_areas);
        let recommended_approach =
            recommend_approach(query.support_type, &matched_peers, &recommended_groups).to_string();

        PeerMatchResponse {
            user_id: req.user_id.clone(),
            estimated_wait_time: estimate_wait_minutes(query.urgency, matched_peers.len()),
            match_confidence: match_confidence(&matched_peers),
            matched_peers,
            recommended_groups,
            recommended_approach,
        }
    }
}

/// Weighted score in [0,1].
pub fn peer_score(peer: &PeerRecord, query: &PeerQuery) -> f64 {
    let expertise = overlap_ratio(&query.expertise_areas, &peer.expertise);
    let availability = overlap_ratio(&query.availability, &peer.availability);
    let experience = ExperienceLevel::weight(peer.experience_level);
    let urgency = match (query.urgency, peer.experience_level) {
        (Urgency::High, Some(ExperienceLevel::Experienced | ExperienceLevel::Trained)) => URGENCY_BONUS,
        _ => 0.0,
    };

    (EXPERTISE_WEIGHT * expertise + AVAILABILITY_WEIGHT * availability + EXPERIENCE_WEIGHT * experience + urgency)
        .clamp(0.0, 1.0)
}

/// |wanted ∩ offered| / max(|wanted|, 1)
fn overlap_ratio(wanted: &[String], offered: &[String]) -> f64 {
    let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
    let offered: HashSet<&str> = offered.iter().map(String::as_str).collect();
    wanted.intersection(&offered).count() as f64 / wanted.len().max(1) as f64
}

/// Shared expertise is listed in the user's order, at most two.
fn match_reason(peer: &PeerRecord, expertise_areas: &[String]) -> String {
    let overlap: Vec<&str> = expertise_areas
        .iter()
        .filter(|area| peer.expertise.contains(area))
        .map(String::as_str)
        .take(2)
        .collect();
    if !overlap.is_empty() {
        format!("Expertise in {}", overlap.join(", "))
    } else if let Some(style) = &peer.support_style {
        format!("{} support style", title_case(style))
    } else {
        "General peer support availability".to_string()
    }
}

/// "{lo}-{hi} minutes" range for a first response.
pub fn response_time(level: Option<ExperienceLevel>, urgency: Urgency) -> String {
    let base = ExperienceLevel::base_response_minutes(level);
    if urgency == Urgency::High {
        format!("{}-{} minutes", (base / 2).max(5), base)
    } else {
        format!("{}-{} minutes", base, base * 2)
    }
}

/// Minutes until the user is likely connected.
pub fn estimate_wait_minutes(urgency: Urgency, peer_count: usize) -> u32 {
    let base = match urgency {
        Urgency::Low => 120,
        Urgency::Medium => 45,
        Urgency::High => 15,
    };
    let shortfall = MAX_PEERS.saturating_sub(peer_count) as u32;
    base + shortfall * 10
}

pub fn match_confidence(peers: &[MatchedPeer]) -> f64 {
    if peers.is_empty() {
        return 0.0;
    }
    round2(peers.iter().map(|p| p.score).sum::<f64>() / peers.len() as f64)
}

pub fn recommend_approach(
    support_type: SupportRequestType,
    peers: &[MatchedPeer],
    groups: &[GroupSession],
) -> &'static str {
    match (support_type, peers.is_empty(), groups.is_empty()) {
        (SupportRequestType::Immediate, false, _) => "One-on-one peer support recommended for immediate needs",
        (SupportRequestType::Group, _, false) => "Group session recommended for shared experiences",
        (_, false, false) => "Combination of peer support and group sessions recommended",
        (_, false, true) => "One-on-one peer support recommended",
        (_, true, false) => "Group sessions recommended",
        (_, true, true) => "Self-guided resources recommended while matching",
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// "mindfulness_based" -> "Mindfulness_Based"
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for c in s.chars() {
        if boundary {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        boundary = !c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn matcher() -> PeerMatcher {
        PeerMatcher::new(Arc::new(KnowledgeBase::builtin().unwrap()))
    }

    fn query(expertise: &[&str], availability: &[&str], urgency: Urgency) -> PeerQuery {
        PeerQuery {
            desired_state: String::new(),
            support_type: SupportRequestType::Scheduled,
            availability: availability.iter().map(|s| s.to_string()).collect(),
            expertise_areas: expertise.iter().map(|s| s.to_string()).collect(),
            urgency,
        }
    }

    #[test]
    fn ranks_by_weighted_score() {
        let got = matcher().match_peers(&query(&["academic_stress", "anxiety"], &["evening"], Urgency::High));
        let names: Vec<&str> = got.iter().map(|m| m.peer.name.as_str()).collect();
        assert_eq!(names, vec!["Alex", "Casey", "Taylor"]);
        assert_eq!(got[0].score, 1.0);
        assert_eq!(got[1].score, 0.6);
        assert_eq!(got[2].score, 0.56);
        assert_eq!(got[0].match_reason, "Expertise in academic_stress, anxiety");
        assert_eq!(got[1].match_reason, "Validating support style");
        assert_eq!(got[0].response_time, "7-15 minutes");
        assert_eq!(got[2].response_time, "15-30 minutes");
    }

    #[test]
    fn zero_overlap_unset_experience_scores_point_one_and_is_excluded() {
        let mut kb = KnowledgeBase::builtin().unwrap();
        kb.peers = vec![PeerRecord {
            id: "peer_x".into(),
            name: "Sam".into(),
            expertise: vec!["grief_loss".into()],
            availability: vec!["morning".into()],
            experience_level: None,
            rating: 4.0,
            support_style: None,
        }];
        let q = query(&["anxiety"], &["evening"], Urgency::High);
        let score = peer_score(&kb.peers[0], &q);
        assert!((score - 0.10).abs() < 1e-9, "score was {score}");
        assert!(PeerMatcher::new(Arc::new(kb)).match_peers(&q).is_empty());
    }

    fn peer(id: &str, expertise: &[&str], availability: &[&str]) -> PeerRecord {
        PeerRecord {
            id: id.into(),
            name: id.into(),
            expertise: expertise.iter().map(|s| s.to_string()).collect(),
            availability: availability.iter().map(|s| s.to_string()).collect(),
            experience_level: Some(ExperienceLevel::Peer),
            rating: 4.5,
            support_style: None,
        }
    }

    #[test]
    fn match_reason_follows_the_users_order() {
        let p = peer("p", &["anxiety", "depression", "academic_stress"], &[]);
        let areas = vec!["academic_stress".to_string(), "depression".to_string(), "anxiety".to_string()];
        assert_eq!(match_reason(&p, &areas), "Expertise in academic_stress, depression");
    }

    #[test]
    fn near_ties_rank_on_rounded_score() {
        // 0.40 * 54/100 + 0.25 + 0.12 = 0.586 and 0.40 * 56/100 + 0.25 + 0.12 = 0.594: both 0.59
        let wanted: Vec<String> = (0..100).map(|i| format!("area_{i}")).collect();
        let fewer: Vec<&str> = wanted[..54].iter().map(String::as_str).collect();
        let more: Vec<&str> = wanted[..56].iter().map(String::as_str).collect();
        let mut kb = KnowledgeBase::builtin().unwrap();
        kb.peers = vec![peer("listed_first", &fewer, &["evening"]), peer("listed_second", &more, &["evening"])];
        let q = PeerQuery {
            desired_state: String::new(),
            support_type: SupportRequestType::Scheduled,
            availability: vec!["evening".into()],
            expertise_areas: wanted,
            urgency: Urgency::Low,
        };
        assert!(peer_score(&kb.peers[1], &q) > peer_score(&kb.peers[0], &q));

        let got = PeerMatcher::new(Arc::new(kb)).match_peers(&q);
        let ids: Vec<&str> = got.iter().map(|m| m.peer.id.as_str()).collect();
        assert_eq!(ids, vec!["listed_first", "listed_second"]);
        assert_eq!(got[0].score, 0.59);
        assert_eq!(got[1].score, 0.59);
    }

    #[test]
    fn at_most_three_peers() {
        let got = matcher().match_peers(&query(&[], &["evening", "weekend", "lunch"], Urgency::High));
        assert!(got.len() <= 3);
        assert!(got.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn low_urgency_response_window() {
        assert_eq!(response_time(Some(ExperienceLevel::Peer), Urgency::Low), "45-90 minutes");
        assert_eq!(response_time(None, Urgency::High), "15-30 minutes");
        assert_eq!(response_time(Some(ExperienceLevel::Experienced), Urgency::Medium), "15-30 minutes");
    }

    #[test]
    fn groups_by_keyword_overlap() {
        let groups = matcher().match_groups(
            "stressed about exams and time management",
            &["academic_stress".to_string()],
        );
        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["group_001", "group_003"]);
    }

    #[test]
    fn group_with_no_shared_keywords_is_excluded() {
        let groups = matcher().match_groups("feeling lonely tonight", &[]);
        assert!(groups.is_empty());
    }

    #[test]
    fn short_keywords_are_ignored() {
        // three-character words never count, even when they appear in the group text
        let groups = matcher().match_groups("and art", &[]);
        assert!(groups.is_empty());
    }

    #[test]
    fn wait_time_penalises_missing_peers() {
        assert_eq!(estimate_wait_minutes(Urgency::Low, 3), 120);
        assert_eq!(estimate_wait_minutes(Urgency::Medium, 1), 65);
        assert_eq!(estimate_wait_minutes(Urgency::High, 0), 45);
        assert_eq!(estimate_wait_minutes(Urgency::High, 5), 15);
    }

    #[test]
    fn approach_selection() {
        let m = matcher();
        let peers = m.match_peers(&query(&["anxiety"], &["evening"], Urgency::High));
        let groups = m.match_groups("anxiety support", &[]);
        assert_eq!(
            recommend_approach(SupportRequestType::Immediate, &peers, &groups),
            "One-on-one peer support recommended for immediate needs"
        );
        assert_eq!(
            recommend_approach(SupportRequestType::Group, &peers, &groups),
            "Group session recommended for shared experiences"
        );
        assert_eq!(
            recommend_approach(SupportRequestType::Scheduled, &peers, &groups),
            "Combination of peer support and group sessions recommended"
        );
        assert_eq!(
            recommend_approach(SupportRequestType::Immediate, &[], &[]),
            "Self-guided resources recommended while matching"
        );
        assert_eq!(
            recommend_approach(SupportRequestType::Immediate, &[], &groups),
            "Group sessions recommended"
        );
    }

    #[test]
    fn respond_assembles_match_response() {
        let req = PeerSupportRequest {
            user_id: "user-1".into(),
            current_state: "anxious about my academic workload".into(),
            support_type: SupportRequestType::Immediate,
            availability: vec!["evening".into()],
            expertise_areas: vec!["academic_stress".into(), "anxiety".into()],
            urgency: Urgency::High,
            timestamp: Utc::now(),
        };
        let resp = matcher().respond(&req);
        assert_eq!(resp.user_id, "user-1");
        assert_eq!(resp.matched_peers.len(), 3);
        assert_eq!(resp.estimated_wait_time, 15);
        assert_eq!(resp.match_confidence, 0.72);
        assert_eq!(
            resp.recommended_approach,
            "One-on-one peer support recommended for immediate needs"
        );
        assert_eq!(resp.recommended_groups[0].id, "group_001");
    }

    #[test]
    fn title_case_matches_style_labels() {
        assert_eq!(title_case("mindfulness_based"), "Mindfulness_Based");
        assert_eq!(title_case("structured"), "Structured");
    }
}
