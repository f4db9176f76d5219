//! Train and compare the three model families on a small synthetic KOI table.
//!
//! Shows the library path without CSV files: build a `FeatureTable`, run the
//! `Preprocessor`, fit each `ModelSpec`, evaluate on the held-out split.

use koi_classifier::dataset::{Column, FeatureTable};
use koi_classifier::metrics::evaluate;
use koi_classifier::model::{Classifier, ModelKind, ModelSpec};
use koi_classifier::preprocessing::{PreprocessConfig, Preprocessor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;

/// Synthetic KOIs: false positives have deeper transits, larger radii and
/// higher SNR (eclipsing binaries). Some stellar temperatures are missing.
fn create_koi_table(n: usize) -> Result<FeatureTable, Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut disposition = Vec::with_capacity(n);
    let mut depth = Vec::with_capacity(n);
    let mut prad = Vec::with_capacity(n);
    let mut snr = Vec::with_capacity(n);
    let mut period = Vec::with_capacity(n);
    let mut steff = Vec::with_capacity(n);

    for i in 0..n {
        let fp = rng.random_bool(0.4);
        let mut jitter = |scale: f64| scale * rng.random_range(-1.0..1.0);
        disposition.push(Some(if fp { "FALSE POSITIVE" } else { "CANDIDATE" }.to_string()));
        depth.push(if fp { 2500.0 + jitter(1500.0) } else { 600.0 + jitter(400.0) });
        prad.push(if fp { 9.0 + jitter(6.0) } else { 2.5 + jitter(1.5) });
        snr.push(if fp { 80.0 + jitter(60.0) } else { 35.0 + jitter(25.0) });
        period.push(30.0 + jitter(29.0));
        steff.push(if i % 15 == 0 { f64::NAN } else { 5700.0 + jitter(700.0) });
    }

    Ok(FeatureTable::from_columns(vec![
        ("koi_disposition", Column::Categorical(disposition)),
        ("koi_depth", Column::Numeric(depth)),
        ("koi_prad", Column::Numeric(prad)),
        ("koi_model_snr", Column::Numeric(snr)),
        ("koi_period", Column::Numeric(period)),
        ("koi_steff", Column::Numeric(steff)),
    ])?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let table = create_koi_table(600)?;
    let data = Preprocessor::new(PreprocessConfig::default()).prepare(&table)?;
    println!(
        "train: {} rows, test: {} rows, features: {:?}",
        data.x_train.nrows(),
        data.x_test.nrows(),
        data.feature_names()
    );

    for kind in ModelKind::ALL {
        let spec = ModelSpec::default_for(kind);
        let model = spec.fit(&data.x_train, &data.y_train, data.n_classes())?;
        let report = evaluate(
            kind.as_str(),
            &model,
            &data.x_test,
            &data.y_test,
            data.label_encoder.classes(),
            data.feature_names(),
        )?;
        println!("\n=== {} ===", kind);
        print!("{}", report.render(5));
    }
    Ok(())
}
