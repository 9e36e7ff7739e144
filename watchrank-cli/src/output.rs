/// Output formatting: terminal table and JSON.
use std::collections::HashSet;

use serde::Serialize;
use watchrank_core::DisplayGraph;

use crate::cache::ScoredWatch;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedTitle {
    pub rank: usize,
    pub title: String,
    pub btscore: f64,
    pub logistic_score: Option<f64>,
    pub view_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    titles: &'a [RankedTitle],
    total_events: usize,
}

/// Collapse per-event rows to one row per title, best Bradley-Terry score first.
/// Ties keep first-seen order.
pub fn rank_titles(movies: &[ScoredWatch]) -> Vec<RankedTitle> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut titles: Vec<RankedTitle> = Vec::new();
    for movie in movies {
        if !seen.insert(movie.event.title.as_str()) {
            continue;
        }
        titles.push(RankedTitle {
            rank: 0,
            title: movie.event.title.clone(),
            btscore: movie.btscore,
            logistic_score: movie.logistic_score,
            view_count: movie.view_count,
        });
    }

    titles.sort_by(|a, b| b.btscore.total_cmp(&a.btscore));
    for (i, t) in titles.iter_mut().enumerate() {
        t.rank = i + 1;
    }
    titles
}

/// Print results as a formatted terminal table.
pub fn print_table(titles: &[RankedTitle], total_events: usize) {
    let title_width = titles.iter().map(|t| t.title.len()).max().unwrap_or(5).max(5); // at least "Title"

    println!(" # | {:<title_width$} | BT Score | Logistic | Views", "Title");
    println!("---|-{}-|----------|----------|------", "-".repeat(title_width));

    for t in titles {
        let logistic = t
            .logistic_score
            .map(|s| format!("{s:>8.4}"))
            .unwrap_or_else(|| format!("{:>8}", "-"));
        println!(
            "{:>2} | {:<title_width$} | {:>8.3} | {} | {:>5}",
            t.rank, t.title, t.btscore, logistic, t.view_count,
        );
    }

    println!("\n{} titles ranked from {} watch events", titles.len(), total_events);
}

/// Print results as JSON.
pub fn print_json(titles: &[RankedTitle], total_events: usize) -> serde_json::Result<()> {
    let output = JsonOutput { titles, total_events };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print the comparison graph as JSON.
pub fn print_graph(graph: &DisplayGraph) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(graph)?);
    Ok(())
}
