mod common;

use common::{sequence_rows, tiny_recurrent};
use hybrid_rul::optim::OptimizerKind;
use hybrid_rul::{Dataset, Matrix, RecurrentBranch, TrainConfig, Trainer};

fn sequences(n: usize) -> Dataset<Matrix> {
    let (seqs, rul) = sequence_rows(n);
    let inputs = seqs.iter().map(|s| Matrix::column(s)).collect();
    Dataset::new(inputs, rul.into_iter().map(|r| r[0]).collect()).unwrap()
}

#[test]
fn full_batch_descent_lowers_the_loss_every_epoch() {
    let data = sequences(10);
    let branch = RecurrentBranch::new(4, &tiny_recurrent()).unwrap();
    // One unshuffled batch per epoch, so each epoch is a single gradient step.
    let config = TrainConfig {
        optimizer: OptimizerKind::Sgd,
        shuffle: false,
        patience: 5,
        ..TrainConfig::new(5, 10, 0.005)
    };
    let outcome = Trainer::new(branch, config).unwrap().fit(&data, &data).unwrap();

    assert_eq!(outcome.history.len(), 5);
    assert!(outcome.history.iter().all(|s| s.train.loss.is_finite() && s.valid.loss.is_finite()));
    assert!(
        outcome.train_loss.windows(2).all(|w| w[1] <= w[0]),
        "train loss rose: {:?}",
        outcome.train_loss
    );
    assert!(outcome.train_loss[4] < outcome.train_loss[0]);
}
