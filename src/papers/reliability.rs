//! Heuristic reliability score for candidate papers

use super::Paper;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const EXPERIMENTAL_PATTERNS: &[&str] = &[
    r"\d+\s*(mg/kg|μm|nm|mm|cm)",
    r"n\s*=\s*\d+",
    r"p\s*[<>=]\s*0\.\d+",
    r"\d+\s*(days?|hours?|weeks?)",
    r"(ic50|ec50|ld50)",
    r"(control|treatment|placebo)",
];

const METHOD_KEYWORDS: &[&str] = &[
    "western blot",
    "pcr",
    "elisa",
    "immunofluorescence",
    "rna-seq",
    "microarray",
    "qrt-pcr",
    "flow cytometry",
];

/// Papers older than this many years lose a little reliability
const STALE_AFTER_YEARS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reliability {
    /// 0.0 - 1.0
    pub score: f32,
    pub flags: Vec<String>,
}

struct Patterns {
    experimental: Vec<Regex>,
    preprint: Regex,
    review: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                experimental: EXPERIMENTAL_PATTERNS
                    .iter()
                    .map(|p| Regex::new(p).ok())
                    .collect::<Option<Vec<_>>>()?,
                preprint: Regex::new(r"(preprint|biorxiv|medrxiv|arxiv)").ok()?,
                review: Regex::new(r"(review|systematic|meta-analysis)").ok()?,
            })
        })
        .as_ref()
}

/// Score how trustworthy a paper looks from its title and abstract.
///
/// Starts at 0.5; experimental detail, review papers, and named lab methods
/// raise it; preprints and publications older than five years lower it.
pub fn assess_reliability(paper: &Paper, current_year: i32) -> Reliability {
    let text = format!("{} {}", paper.title, paper.abstract_text).to_lowercase();
    let mut score: f32 = 0.5;
    let mut flags = Vec::new();

    if let Some(p) = patterns() {
        let evidence = p.experimental.iter().filter(|re| re.is_match(&text)).count();
        if evidence >= 3 {
            score += 0.3;
        } else if evidence >= 1 {
            score += 0.1;
        } else {
            flags.push("limited_experimental_data".to_string());
        }

        if p.preprint.is_match(&text) || paper.source == "arxiv" {
            score -= 0.2;
            flags.push("preprint".to_string());
        }

        if p.review.is_match(&text) {
            score += 0.2;
        }
    }

    let methods = METHOD_KEYWORDS.iter().filter(|m| text.contains(*m)).count();
    if methods > 0 {
        score += (methods as f32 * 0.05).min(0.2);
    }

    if let Some(year) = paper.year() {
        if current_year - year > STALE_AFTER_YEARS {
            score -= 0.1;
            flags.push("older_publication".to_string());
        }
    }

    Reliability {
        score: score.clamp(0.0, 1.0),
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(source: &str, title: &str, abstract_text: &str, published: Option<&str>) -> Paper {
        Paper {
            external_id: format!("{}:1", source),
            source: source.to_string(),
            title: title.to_string(),
            authors: vec![],
            abstract_text: abstract_text.to_string(),
            published: published.map(str::to_string),
            url: String::new(),
            pdf_url: None,
        }
    }

    #[test]
    fn test_strong_experimental_paper() {
        let p = paper(
            "pubmed",
            "Dose response of compound X",
            "Mice (n = 40) received 10 mg/kg for 14 days versus placebo; p < 0.01. Western blot and ELISA confirmed.",
            Some("2024"),
        );
        let r = assess_reliability(&p, 2025);
        // 0.5 + 0.3 experimental + 0.1 methods
        assert!((r.score - 0.9).abs() < 1e-5, "score was {}", r.score);
        assert!(r.flags.is_empty());
    }

    #[test]
    fn test_old_arxiv_preprint() {
        let p = paper("arxiv", "A theory note", "We discuss ideas.", Some("2010-01-01"));
        let r = assess_reliability(&p, 2025);
        // 0.5 - 0.2 preprint - 0.1 age
        assert!((r.score - 0.2).abs() < 1e-5, "score was {}", r.score);
        assert!(r.flags.contains(&"preprint".to_string()));
        assert!(r.flags.contains(&"older_publication".to_string()));
        assert!(r.flags.contains(&"limited_experimental_data".to_string()));
    }

    #[test]
    fn test_score_is_clamped() {
        let p = paper(
            "pubmed",
            "Systematic review and meta-analysis",
            "n = 100, p < 0.05, 12 weeks, IC50, control, 5 mg/kg; pcr elisa western blot rna-seq flow cytometry",
            Some("2024"),
        );
        assert_eq!(assess_reliability(&p, 2024).score, 1.0);
    }
}
