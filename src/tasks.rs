//! The batch pipelines. Each task clears its result directory, writes its CSV and
//! JSON reports and hands back the charts it wants rendered.

use crate::{
    chart::{color_for, Chart, Dataset, RenderJob},
    config::{Corpus, FrequencyConfig, Library, Output, SimilarityConfig, Topic},
    frequency::{aggregate, aggregate_all, bottom_n, rank, top_n, FrequencyTable, PostOperatorCounts, TopicMembership},
    input::{
        find_library_file, load_frequency_table, load_manifest, load_post_operator_counts, load_topic_membership,
    },
    output::{clear_and_recreate, write_csv, write_json},
    similarity::{positional_overlap, positional_similarity, similarity_match},
};
use anyhow::Result;
use log::info;
use std::path::Path;

/// Ranked frequency table of every library, with its most and least used operators charted.
pub async fn frequencies(corpus: &Corpus, config: &FrequencyConfig, output: &Output) -> Result<Vec<RenderJob>> {
    let dir = output.frequency_dir();
    clear_and_recreate(&dir).await?;
    let mut jobs = Vec::new();
    for library in &corpus.libraries {
        info!("Computing {} operator frequencies", library.name);
        let counts = load_post_operator_counts(corpus.result_path(library)).await?;
        let mut table = aggregate(&counts, None);
        if config.include_manifest {
            table.seed(load_manifest(corpus.manifest_path(library)).await?);
        }
        let ranked = rank(&table);
        jobs.push(RenderJob::new(
            dir.join(format!("frequency_{}_topMostUsed.png", library.name)),
            Chart::frequency(&top_n(&ranked, config.samples, false), config.chart_kind),
        ));
        jobs.push(RenderJob::new(
            dir.join(format!("frequency_{}_topLeastUsed.png", library.name)),
            Chart::frequency(&bottom_n(&ranked, config.samples, false), config.chart_kind),
        ));
        write_csv(dir.join(format!("frequencies_{}.csv", library.name)), &ranked).await?;
        write_json(dir.join(format!("frequencies_{}.json", library.name)), &ranked).await?;
    }
    Ok(jobs)
}

/// Similarity scores of one library against each topic, as percentages.
#[derive(Debug, Default)]
struct LibraryScores {
    overall: Vec<f64>,
    most_used: Vec<f64>,
    least_used: Vec<f64>,
}

/// Compare how GitHub code and Stack Overflow topics use each library's operators.
///
/// Needs the JSON tables written by [`frequencies`].
pub async fn similarity(corpus: &Corpus, config: &SimilarityConfig, output: &Output) -> Result<Vec<RenderJob>> {
    let dir = output.similarity_dir();
    clear_and_recreate(&dir).await?;
    let mut topics = Vec::with_capacity(config.topics.len());
    for topic in &config.topics {
        let members = load_topic_membership(corpus.posts_topic_dir().join(format!("{}.json", topic.id))).await?;
        topics.push((topic, members));
    }

    let mut overall = Vec::new();
    let mut most_used = Vec::new();
    let mut least_used = Vec::new();
    for library in &corpus.libraries {
        info!("Comparing {} operator usage by topic", library.name);
        let github_path = config.frequencies_dir.join(format!("frequencies_{}.json", library.name));
        let github = rank(&load_frequency_table(github_path).await?);
        let posts_path = find_library_file(corpus.posts_operator_search_dir(), &library.name).await?;
        let posts = load_post_operator_counts(posts_path).await?;
        let scores = compare_library(&dir, library, config, &github, &posts, &topics).await?;
        overall.push(series(library, scores.overall));
        most_used.push(series(library, scores.most_used));
        least_used.push(series(library, scores.least_used));
    }

    let labels: Vec<String> = config.topics.iter().map(|topic| topic.label.clone()).collect();
    Ok(vec![
        RenderJob::new(
            dir.join("similarity.png"),
            Chart::percentage_groups(labels.clone(), overall, config.overall_axis, config.chart_width),
        ),
        RenderJob::new(
            dir.join("similarity_mostUsed.png"),
            Chart::percentage_groups(labels.clone(), most_used, config.most_used_axis, config.chart_width),
        ),
        RenderJob::new(
            dir.join("similarity_leastUsed.png"),
            Chart::percentage_groups(labels, least_used, config.least_used_axis, config.chart_width),
        ),
    ])
}

async fn compare_library(
    dir: &Path,
    library: &Library,
    config: &SimilarityConfig,
    github: &FrequencyTable,
    posts: &PostOperatorCounts,
    topics: &[(&Topic, TopicMembership)],
) -> Result<LibraryScores> {
    let mut scores = LibraryScores::default();
    let github_keys: Vec<&str> = github.keys().collect();
    for (topic, members) in topics {
        let file_name = |prefix: &str| dir.join(format!("{}_{}_{}.csv", prefix, topic.label, library.name));
        let topic_table = rank(&aggregate(posts, Some(members)));
        write_csv(file_name("frequencies"), &topic_table).await?;

        let topic_keys: Vec<&str> = topic_table.keys().collect();
        scores.overall.push(positional_similarity(&github_keys, &topic_keys) * 100.0);
        write_csv(file_name("similarities"), &positional_overlap(github, &topic_table)).await?;

        let most = similarity_match(
            &top_n(github, config.samples, true),
            &top_n(&topic_table, config.samples, true),
        );
        scores.most_used.push(most.percent());
        write_csv(file_name("similarities_mostUsed"), &most.common).await?;

        let least = similarity_match(
            &bottom_n(github, config.samples, true),
            &bottom_n(&topic_table, config.samples, true),
        );
        scores.least_used.push(least.percent());
        write_csv(file_name("similarities_leastUsed"), &least.common).await?;
        info!(
            "{} / {}: {:.1}% positional, {:.1}% most used, {:.1}% least used",
            library.name,
            topic.label,
            scores.overall.last().copied().unwrap_or_default(),
            most.percent(),
            least.percent()
        );
    }
    Ok(scores)
}

fn series(library: &Library, data: Vec<f64>) -> Dataset {
    Dataset {
        label: Some(library.name.clone()),
        data,
        colors: vec![color_for(&library.name)],
    }
}

/// Share of used operators across all libraries together.
pub async fn utilization(corpus: &Corpus, output: &Output) -> Result<Vec<RenderJob>> {
    let dir = output.utilization_dir();
    clear_and_recreate(&dir).await?;
    let mut corpora = Vec::with_capacity(corpus.libraries.len());
    for library in &corpus.libraries {
        corpora.push(load_post_operator_counts(corpus.result_path(library)).await?);
    }
    let utilization = aggregate_all(&corpora).utilization();
    info!("{} operators used, {} not used", utilization.used, utilization.unused);
    Ok(vec![RenderJob::new(
        dir.join("utilization.png"),
        Chart::utilization_pie(utilization.used, utilization.unused),
    )])
}

/// Share of used operators of each library.
pub async fn utilization_distribution(corpus: &Corpus, output: &Output) -> Result<Vec<RenderJob>> {
    let dir = output.utilization_distribution_dir();
    clear_and_recreate(&dir).await?;
    let mut names = Vec::new();
    let mut used = Vec::new();
    let mut unused = Vec::new();
    for library in &corpus.libraries {
        let counts = load_post_operator_counts(corpus.result_path(library)).await?;
        let utilization = aggregate(&counts, None).utilization();
        info!(
            "{}: {:.1}% of {} operators used",
            library.name,
            utilization.used_percent(),
            utilization.total()
        );
        names.push(library.name.clone());
        used.push(utilization.used_percent());
        unused.push(utilization.unused_percent());
    }
    Ok(vec![RenderJob::new(
        dir.join("utilization_perDistribution.png"),
        Chart::utilization_stacked(names, used, unused),
    )])
}
