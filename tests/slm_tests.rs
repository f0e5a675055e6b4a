/// Language model integration tests — training from fixtures, sampling,
/// scoring, and attribution.

use chatter_engine::core::attribution::{attribution_matrix, train_models};
use chatter_engine::core::config::{AttributionConfig, SlmConfig};
use chatter_engine::core::corpus::Corpus;
use chatter_engine::core::markov::{Slm, SlmError};
use chatter_engine::core::tokenizer::Granularity;
use chatter_engine::core::transitions::LINE_START;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

const TOUR_CORPUS: &str = "tests/fixtures/tour_corpus.txt";

fn full_tour_model(order: usize) -> Slm {
    let corpus = Corpus::load(Path::new(TOUR_CORPUS), Granularity::Word, false).unwrap();
    Slm::train(corpus, order, 100.0).unwrap()
}

#[test]
fn config_trains_and_fits_distribution() {
    let config = SlmConfig::load_from_ron(Path::new("tests/fixtures/tour_model.ron")).unwrap();
    let model = Slm::from_config(&config).unwrap();

    assert_eq!(model.order(), 2);
    let stats = model.stats().expect("held-out distribution should be fitted");
    assert!(stats.chunks >= 2);
    assert!(stats.standard_deviation > 0.0);
}

#[test]
fn tour_text_is_more_typical_than_recipes() {
    let config = SlmConfig::load_from_ron(Path::new("tests/fixtures/tour_model.ron")).unwrap();
    let model = Slm::from_config(&config).unwrap();

    let tour = model
        .estimate("The library has three floors and students study in the reading room.")
        .unwrap();
    let recipe = model
        .estimate("Whisk the eggs with sugar and fold in the melted chocolate.")
        .unwrap();
    assert!(tour > recipe, "tour z = {}, recipe z = {}", tour, recipe);
}

#[test]
fn every_context_partitions_the_unit_interval() {
    for order in 1..=4 {
        let model = full_tour_model(order);
        for (context, options) in model.transitions().iter() {
            let total: f64 = options.iter().map(|c| c.interval.width()).sum();
            assert!(
                (total - 1.0).abs() < 1e-9,
                "order {} context {:?} sums to {}",
                order,
                context,
                total
            );
        }
    }
}

#[test]
fn generation_is_reproducible_with_a_seed() {
    let model = full_tour_model(3);
    let mut rng1 = StdRng::seed_from_u64(1234);
    let mut rng2 = StdRng::seed_from_u64(1234);
    let a = model.generate(40, None, &mut rng1).unwrap();
    let b = model.generate(40, None, &mut rng2).unwrap();
    assert_eq!(a, b);
    assert!(a.starts_with("welcome to the"), "got: {}", a);
}

#[test]
fn prompted_generation_continues_the_prompt() {
    let model = full_tour_model(2);
    let mut rng = StdRng::seed_from_u64(5);
    let tokens = model
        .generate_tokens(12, Some("Tell me about the clock tower"), &mut rng)
        .unwrap();
    assert_eq!(tokens.len(), 12);
    assert_eq!(&tokens[..2], &["clock".to_string(), "tower".to_string()]);
}

#[test]
fn unknown_seed_fails_without_breaking_the_model() {
    let model = full_tour_model(2);
    let mut rng = StdRng::seed_from_u64(0);

    let err = model
        .generate(20, Some("quantum spaghetti"), &mut rng)
        .unwrap_err();
    assert!(matches!(err, SlmError::UnknownContext(_)));
    assert!(err.to_string().contains("quantum spaghetti"));

    assert!(model.generate(20, None, &mut rng).is_ok());
}

#[test]
fn line_marked_corpus_restarts_at_every_line() {
    let corpus = Corpus::load(Path::new(TOUR_CORPUS), Granularity::Word, true).unwrap();
    let model = Slm::train(corpus, 2, 100.0).unwrap();

    let openings = model.transitions().get(&[LINE_START.to_string()]).unwrap();
    assert!(openings.len() > 10, "only {} line openings", openings.len());
    assert!(openings.iter().all(|c| c.tokens.len() == 2));

    let mut rng = StdRng::seed_from_u64(17);
    let out = model.generate(30, None, &mut rng).unwrap();
    assert!(!out.is_empty());
}

#[test]
fn character_model_scores_its_own_corpus() {
    let corpus = Corpus::load(Path::new(TOUR_CORPUS), Granularity::Character, false).unwrap();
    let mut model = Slm::train(corpus, 4, 80.0).unwrap();
    model.estimate_distribution(200, 20.0).unwrap();

    let familiar = model.estimate("the library is open to visitors").unwrap();
    let noise = model.estimate("xqzj vwkp qqxz jjvv").unwrap();
    assert!(familiar > noise);
}

#[test]
fn held_out_text_is_attributed_to_its_own_model() {
    let config =
        AttributionConfig::load_from_ron(Path::new("tests/fixtures/attribution.ron")).unwrap();
    let models = train_models(&config.models).unwrap();
    let matrix = attribution_matrix(&models, 20.0, config.chunk_size).unwrap();

    assert_eq!(matrix.len(), 2);
    for (i, row) in matrix.iter().enumerate() {
        let best = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, _)| j)
            .unwrap();
        assert_eq!(best, i, "row {} scores: {:?}", i, row);
    }
}

#[test]
fn attribution_rejects_bad_percent_and_survives_huge_chunks() {
    let config =
        AttributionConfig::load_from_ron(Path::new("tests/fixtures/attribution.ron")).unwrap();
    let models = train_models(&config.models).unwrap();

    assert!(matches!(
        attribution_matrix(&models, -5.0, config.chunk_size).unwrap_err(),
        SlmError::InvalidPercent(_)
    ));

    let matrix = attribution_matrix(&models, 20.0, usize::MAX).unwrap();
    assert_eq!(matrix.len(), models.len());
}

#[test]
fn model_config_with_huge_chunk_size_reports_too_few_chunks() {
    let mut config = SlmConfig::load_from_ron(Path::new("tests/fixtures/tour_model.ron")).unwrap();
    config.chunk_size = usize::MAX;
    assert!(matches!(
        Slm::from_config(&config).unwrap_err(),
        SlmError::TooFewChunks(1)
    ));
}
