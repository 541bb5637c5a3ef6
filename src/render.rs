//! Turns true-scores into verdicts, colors and highlighted HTML.

use crate::classification::SentenceScore;

pub const TRUE_COLOR: &str = "#16a34a";
pub const FALSE_COLOR: &str = "#dc2626";
pub const UNCERTAIN_COLOR: &str = "#d97706";
/// Verdict color of the empty result.
pub const NEUTRAL_COLOR: &str = "#6b7280";

const TRUE_THRESHOLD: f64 = 0.6;
const FALSE_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictLabel {
    LikelyTrue,
    LikelyFalse,
    Uncertain,
}

impl VerdictLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLabel::LikelyTrue => "Likely True",
            VerdictLabel::LikelyFalse => "Likely False",
            VerdictLabel::Uncertain => "Uncertain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub color: &'static str,
}

/// Buckets an overall score; both thresholds are inclusive.
pub fn verdict_from_score(score: f64) -> Verdict {
    if score >= TRUE_THRESHOLD {
        return Verdict {
            label: VerdictLabel::LikelyTrue,
            color: TRUE_COLOR,
        };
    }
    if score <= FALSE_THRESHOLD {
        return Verdict {
            label: VerdictLabel::LikelyFalse,
            color: FALSE_COLOR,
        };
    }
    Verdict {
        label: VerdictLabel::Uncertain,
        color: UNCERTAIN_COLOR,
    }
}

/// Background for one highlighted sentence. The checks run in this exact
/// order; reordering them changes the 0.6 and 0.4 edges.
pub fn sentence_background_color(score: f64) -> &'static str {
    if score >= 0.7 {
        return "#bbf7d0";
    }
    if score >= 0.6 {
        return "#dcfce7";
    }
    if score <= 0.3 {
        return "#fecaca";
    }
    if score <= 0.4 {
        return "#fee2e2";
    }
    "#fef9c3"
}

/// Escapes `&`, `<` and `>`. `&` goes first so the entities added for the
/// other two are not escaped again.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Score as a whole percentage, rounding halves to even.
pub fn score_percent(score: f64) -> i64 {
    (score * 100.0).round_ties_even() as i64
}

pub fn render_highlighted_html(scores: &[SentenceScore]) -> String {
    let spans = scores
        .iter()
        .map(|score| {
            format!(
                "<span style=\"background:{}; padding:2px 4px; border-radius:4px; margin-right:2px; display:inline;\">{} <small style='opacity:0.7'>(true {}%)</small></span>",
                sentence_background_color(score.true_score),
                escape_html(&score.sentence),
                score_percent(score.true_score)
            )
        })
        .collect::<Vec<_>>();
    format!("<div style='line-height:1.9'>{}</div>", spans.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn scored(sentence: &str, true_score: f64) -> SentenceScore {
        SentenceScore {
            sentence: sentence.to_string(),
            true_score,
        }
    }

    #[test]
    fn verdict_boundaries_are_inclusive() {
        assert_eq!(verdict_from_score(0.6).label, VerdictLabel::LikelyTrue);
        assert_eq!(verdict_from_score(0.6).color, "#16a34a");
        assert_eq!(verdict_from_score(0.4).label, VerdictLabel::LikelyFalse);
        assert_eq!(verdict_from_score(0.4).color, "#dc2626");
        assert_eq!(verdict_from_score(0.5).label, VerdictLabel::Uncertain);
        assert_eq!(verdict_from_score(0.5).color, "#d97706");
    }

    #[test]
    fn verdict_labels_are_display_strings() {
        let labels = [
            VerdictLabel::LikelyTrue,
            VerdictLabel::LikelyFalse,
            VerdictLabel::Uncertain,
        ];
        let names = labels.iter().map(VerdictLabel::as_str).collect::<Vec<_>>();
        assert_eq!(names, vec!["Likely True", "Likely False", "Uncertain"]);
    }

    #[test]
    fn every_score_gets_exactly_one_verdict() {
        for step in 0..=1000 {
            let score = step as f64 / 1000.0;
            let verdict = verdict_from_score(score);
            let expected = if score >= 0.6 {
                VerdictLabel::LikelyTrue
            } else if score <= 0.4 {
                VerdictLabel::LikelyFalse
            } else {
                VerdictLabel::Uncertain
            };
            assert_eq!(verdict.label, expected, "score {score}");
        }
        assert_eq!(verdict_from_score(f64::NAN).label, VerdictLabel::Uncertain);
    }

    #[test]
    fn background_buckets_follow_check_order() {
        assert_eq!(sentence_background_color(0.95), "#bbf7d0");
        assert_eq!(sentence_background_color(0.7), "#bbf7d0");
        assert_eq!(sentence_background_color(0.65), "#dcfce7");
        assert_eq!(sentence_background_color(0.6), "#dcfce7");
        assert_eq!(sentence_background_color(0.5), "#fef9c3");
        assert_eq!(sentence_background_color(0.4), "#fee2e2");
        assert_eq!(sentence_background_color(0.35), "#fee2e2");
        assert_eq!(sentence_background_color(0.3), "#fecaca");
        assert_eq!(sentence_background_color(0.0), "#fecaca");
    }

    #[test]
    fn escapes_ampersand_first() {
        assert_eq!(escape_html("<b>&1</b>"), "&lt;b&gt;&amp;1&lt;/b&gt;");
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn percent_rounds_half_to_even() {
        assert_eq!(score_percent(0.125), 12);
        assert_eq!(score_percent(0.5), 50);
        assert_eq!(score_percent(0.999), 100);
        assert_eq!(score_percent(0.0), 0);
    }

    #[test]
    fn renders_spans_inside_container() {
        let html = render_highlighted_html(&[
            scored("Water boils at 100 °C.", 0.92),
            scored("The <moon> is cheese & crackers.", 0.08),
        ]);
        assert_snapshot!(html, @r#"<div style='line-height:1.9'><span style="background:#bbf7d0; padding:2px 4px; border-radius:4px; margin-right:2px; display:inline;">Water boils at 100 °C. <small style='opacity:0.7'>(true 92%)</small></span> <span style="background:#fecaca; padding:2px 4px; border-radius:4px; margin-right:2px; display:inline;">The &lt;moon&gt; is cheese &amp; crackers. <small style='opacity:0.7'>(true 8%)</small></span></div>"#);
    }

    #[test]
    fn empty_scores_render_empty_container() {
        assert_eq!(render_highlighted_html(&[]), "<div style='line-height:1.9'></div>");
    }
}
