//! Anti-bot challenge detection.
//!
//! Response bodies are matched against an ordered table of interstitial
//! signatures; the first hit wins. Detection is advisory: extraction still
//! proceeds, the consumer just learns the page is probably not the content
//! it asked for.

use lazy_static::lazy_static;
use regex::Regex;

/// One detected challenge: the table row's reason plus the pattern text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMatch {
    pub reason: &'static str,
    pub pattern: &'static str,
}

struct ChallengeRule {
    reason: &'static str,
    pattern: &'static str,
    regex: Regex,
}

macro_rules! challenge_rule {
    ($reason:literal, $pattern:literal) => {
        ChallengeRule {
            reason: $reason,
            pattern: $pattern,
            regex: Regex::new($pattern).expect("static challenge regex"),
        }
    };
}

lazy_static! {
    /// Ordered: earlier rows take precedence when several match.
    static ref CHALLENGE_TABLE: Vec<ChallengeRule> = vec![
        challenge_rule!("captcha", r"(?i)captcha"),
        challenge_rule!(
            "human-verification",
            r"(?i)verify(ing)?\s+(that\s+)?you\s+are\s+(a\s+)?human|human\s+verification"
        ),
        challenge_rule!(
            "robot-check",
            r"(?i)are\s+you\s+a\s+robot|robot\s+check|not\s+a\s+robot"
        ),
        challenge_rule!("access-denied", r"(?i)access\s+denied|error\s+1020|blocked\s+by"),
        challenge_rule!("perimeterx", r"(?i)perimeterx|px-captcha|_pxhd"),
        challenge_rule!(
            "javascript-required",
            r"(?i)(enable|requires?)\s+javascript|javascript\s+is\s+(disabled|required)"
        ),
        challenge_rule!("unusual-traffic", r"(?i)unusual\s+traffic"),
    ];
}

/// Scan a body for challenge signatures. Returns the first matching row.
#[must_use]
pub fn detect_challenge(body: &str) -> Option<ChallengeMatch> {
    CHALLENGE_TABLE
        .iter()
        .find(|rule| rule.regex.is_match(body))
        .map(|rule| ChallengeMatch {
            reason: rule.reason,
            pattern: rule.pattern,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_captcha_first() {
        let body = "<html><body>Please complete the CAPTCHA to continue</body></html>";
        let hit = detect_challenge(body).expect("challenge");
        assert_eq!(hit.reason, "captcha");
    }

    #[test]
    fn table_order_breaks_multi_matches() {
        // Contains both a captcha marker and a robot-check phrase; the
        // earlier table row wins.
        let body = "Complete the captcha to prove you are not a robot";
        assert_eq!(detect_challenge(body).unwrap().reason, "captcha");
    }

    #[test]
    fn detects_each_reason() {
        let cases = [
            ("solve this CAPTCHA", "captcha"),
            ("we are verifying that you are a human", "human-verification"),
            ("Are you a robot?", "robot-check"),
            ("Access Denied", "access-denied"),
            ("protected by PerimeterX", "perimeterx"),
            ("Please enable JavaScript to view this page", "javascript-required"),
            ("unusual traffic from your network", "unusual-traffic"),
        ];
        for (body, reason) in cases {
            assert_eq!(
                detect_challenge(body).map(|m| m.reason),
                Some(reason),
                "body: {body}"
            );
        }
    }

    #[test]
    fn plain_articles_pass() {
        assert!(detect_challenge("<p>Ordinary article text.</p>").is_none());
    }
}
