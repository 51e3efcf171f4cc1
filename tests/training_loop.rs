mod common;

use common::{fill_params, frozen_sgd, linear_dataset, linear_model};
use hybrid_rul::layers::Mode;
use hybrid_rul::train::evaluate;
use hybrid_rul::{Dataset, Device, Error, LossType, Regressor, TrainConfig, Trainer};

#[test]
fn epoch_means_divide_by_sample_count() {
    let data = linear_dataset(5);
    let mut model = linear_model(1, 7);
    let errors: Vec<f64> = data.inputs().iter().zip(data.targets())
        .map(|(x, y)| model.forward(x, Mode::Eval) - y)
        .collect();
    let se: f64 = errors.iter().map(|e| e * e).sum();
    let ae: f64 = errors.iter().map(|e| e.abs()).sum();

    // Batches of 2, 2 and 1: a mean over batches would weight the last sample twice.
    let mut trainer = Trainer::new(model, frozen_sgd(1, 2, 1)).unwrap();
    let train = trainer.train_step(&data);
    assert!((train.loss - se / 5.0).abs() < 1e-9);

    let valid = trainer.valid_step(&data);
    assert!((valid.loss - se / 5.0).abs() < 1e-9);
    assert!((valid.mae - ae / 5.0).abs() < 1e-9);
    assert!((valid.rmse - (se / 5.0).sqrt()).abs() < 1e-9);
}

#[test]
fn perfect_predictions_have_full_accuracy() {
    let data = Dataset::new(vec![vec![1.0], vec![2.0]], vec![10.0, 20.0]).unwrap();
    let mut model = linear_model(1, 0);
    for (name, p) in model.params_mut() {
        p.value.fill(if name.ends_with("weights") { 10.0 } else { 0.0 });
    }

    let stats = evaluate(&mut model, &data, LossType::Mse, 256);
    assert_eq!(stats.accuracy, 100.0);
    assert_eq!(stats.mae, 0.0);
    assert_eq!(stats.rmse, 0.0);
}

#[test]
fn non_improving_epoch_keeps_the_snapshot_bit_identical() {
    let data = linear_dataset(6);
    let mut trainer = Trainer::new(linear_model(1, 1), frozen_sgd(5, 3, 5)).unwrap();

    trainer.run_epoch(1, &data, &data).unwrap();
    let saved = trainer.best_state().cloned().unwrap();

    fill_params(trainer.model_mut(), 100.0);
    trainer.run_epoch(2, &data, &data).unwrap();

    assert!(!trainer.history()[1].improved);
    assert_eq!(trainer.best_state(), Some(&saved));
    assert_ne!(&trainer.model().state_dict(), &saved);
}

#[test]
fn finalize_restores_the_best_epoch() {
    let data = linear_dataset(6);
    let mut trainer = Trainer::new(linear_model(1, 1), frozen_sgd(5, 3, 5)).unwrap();
    trainer.run_epoch(1, &data, &data).unwrap();
    let best = trainer.best_state().cloned().unwrap();
    fill_params(trainer.model_mut(), 100.0);
    trainer.run_epoch(2, &data, &data).unwrap();

    let outcome = trainer.finalize(&data).unwrap();
    assert_eq!(outcome.best_epoch, 1);
    assert_eq!(outcome.model.state_dict(), best);
    assert_eq!(outcome.test, outcome.history[0].valid);
}

#[test]
fn constant_validation_loss_stops_after_patience_plus_one_epochs() {
    let data = linear_dataset(4);
    let trainer = Trainer::new(linear_model(1, 2), frozen_sgd(10, 2, 3)).unwrap();
    let outcome = trainer.fit(&data, &data).unwrap();

    assert_eq!(outcome.history.len(), 4);
    assert!(outcome.stopped_early);
    assert_eq!(outcome.train_loss.len(), 4);
    assert_eq!(outcome.val_loss.len(), 4);
}

#[test]
fn zero_epoch_run_has_no_snapshot() {
    let data = linear_dataset(4);
    let trainer = Trainer::new(linear_model(1, 2), frozen_sgd(0, 2, 3)).unwrap();
    assert!(matches!(trainer.fit(&data, &data), Err(Error::State(_))));
}

#[test]
fn empty_dataset_is_a_data_error() {
    let data = linear_dataset(4);
    let empty = Dataset::new(Vec::<Vec<f64>>::new(), vec![]).unwrap();
    let trainer = Trainer::new(linear_model(1, 2), frozen_sgd(1, 2, 3)).unwrap();
    assert!(matches!(trainer.fit(&empty, &data), Err(Error::Data(_))));
}

#[test]
fn unavailable_device_fails_at_construction() {
    let config = TrainConfig { device: Device::Cuda, ..TrainConfig::default() };
    assert!(matches!(Trainer::new(linear_model(1, 0), config), Err(Error::Device(_))));
}

#[test]
fn learning_rate_decays_once_per_epoch() {
    let data = linear_dataset(4);
    let config = TrainConfig { learning_rate: 0.01, lr_gamma: 0.5, ..frozen_sgd(3, 4, 5) };
    let outcome = Trainer::new(linear_model(1, 0), config).unwrap().fit(&data, &data).unwrap();
    let rates: Vec<f64> = outcome.history.iter().map(|s| s.learning_rate).collect();
    assert_eq!(rates, vec![0.01, 0.005, 0.0025]);
}

#[test]
fn checkpoint_file_is_written_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chkpt").join("best.json");
    let data = linear_dataset(6);
    let config = TrainConfig {
        checkpoint_path: Some(path.clone()),
        ..TrainConfig::new(3, 2, 0.01)
    };
    let outcome = Trainer::new(linear_model(1, 4), config).unwrap().fit(&data, &data).unwrap();

    assert!(path.is_file());
    let stored = hybrid_rul::StateDict::load_json(&path).unwrap();
    assert_eq!(outcome.model.state_dict(), stored);
}

#[test]
fn checkpointed_run_finalizes_to_the_exact_best_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let data = linear_dataset(6);
    let config = TrainConfig {
        checkpoint_path: Some(dir.path().join("best.json")),
        ..TrainConfig::new(4, 2, 0.037)
    };
    let mut trainer = Trainer::new(linear_model(1, 7), config).unwrap();
    for epoch in 1..=4 {
        trainer.run_epoch(epoch, &data, &data).unwrap();
    }
    let best = trainer.best_state().cloned().unwrap();

    let outcome = trainer.finalize(&data).unwrap();
    assert_eq!(outcome.model.state_dict(), best);
}

/// Sets the single weight to `w` and the bias to 1.
fn set_line(model: &mut impl Regressor, w: f64) {
    for (name, p) in model.params_mut() {
        p.value.fill(if name.ends_with("weights") { w } else { 1.0 });
    }
}

#[test]
fn equal_validation_accuracy_is_decided_by_training_accuracy() {
    // The prediction at x = 0 is the bias alone, so validation accuracy is
    // 100% for every weight and only the training fit differs.
    let valid = Dataset::new(vec![vec![0.0]], vec![1.0]).unwrap();
    let train = Dataset::new(vec![vec![1.0]], vec![3.0]).unwrap();
    let mut trainer = Trainer::new(linear_model(1, 2), frozen_sgd(5, 1, 10)).unwrap();

    set_line(trainer.model_mut(), 2.0);
    trainer.run_epoch(1, &train, &valid).unwrap();
    let first = trainer.best_state().cloned().unwrap();
    assert!(trainer.history()[0].improved);

    set_line(trainer.model_mut(), 5.0);
    trainer.run_epoch(2, &train, &valid).unwrap();
    assert_eq!(trainer.history()[1].valid.accuracy, trainer.history()[0].valid.accuracy);
    assert!(trainer.history()[1].train.accuracy < trainer.history()[0].train.accuracy);
    assert!(!trainer.history()[1].improved);
    assert_eq!(trainer.best_state(), Some(&first));

    set_line(trainer.model_mut(), 2.0);
    trainer.run_epoch(3, &train, &valid).unwrap();
    assert_eq!(trainer.history()[2].train.accuracy, trainer.history()[0].train.accuracy);
    assert!(trainer.history()[2].improved);

    let outcome = trainer.finalize(&valid).unwrap();
    assert_eq!(outcome.best_epoch, 3);
}

#[test]
fn adam_fits_a_linear_target() {
    let data = linear_dataset(8);
    let config = TrainConfig {
        lr_gamma: 0.98,
        patience: 50,
        ..TrainConfig::new(200, 4, 0.1)
    };
    let outcome = Trainer::new(linear_model(1, 9), config).unwrap().fit(&data, &data).unwrap();
    assert!(outcome.test.mae < 0.5, "mae {}", outcome.test.mae);
    assert!(outcome.test.accuracy > 90.0);
}
