use std::collections::BTreeMap;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::param::{NamedParam, NamedParamMut};
use crate::math::matrix::Matrix;

/// A named, deep-copied snapshot of model parameters.
///
/// Snapshots own their tensors: restoring one into a model and training on
/// afterwards never changes the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    tensors: BTreeMap<String, Matrix>,
}

impl StateDict {
    pub fn from_params<'a, P>(params: P) -> StateDict
    where
        P: IntoIterator<Item = NamedParam<'a>>,
    {
        StateDict {
            tensors: params
                .into_iter()
                .map(|(name, p)| (name, p.value.clone()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Matrix> {
        self.tensors.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Matrix) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Keeps only the tensors whose name starts with `prefix`.
    pub fn filter_prefix(&self, prefix: &str) -> StateDict {
        StateDict {
            tensors: self.tensors
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Copies every snapshot tensor into the live parameter of the same name.
    ///
    /// Every live parameter must have a tensor of identical shape.
    pub fn restore_into(&self, params: Vec<NamedParamMut<'_>>) -> Result<()> {
        for (name, param) in params {
            let tensor = self.tensors.get(&name)
                .ok_or_else(|| Error::State(format!("snapshot has no tensor '{}'", name)))?;
            if !tensor.is_well_formed() {
                return Err(Error::State(format!(
                    "tensor '{}' declares shape {:?} but its data does not match",
                    name,
                    tensor.shape()
                )));
            }
            if tensor.shape() != param.value.shape() {
                return Err(Error::State(format!(
                    "tensor '{}' has shape {:?} in the snapshot but {:?} in the model",
                    name,
                    tensor.shape(),
                    param.value.shape()
                )));
            }
            param.value.clone_from(tensor);
        }
        Ok(())
    }

    /// Serializes the snapshot to a pretty-printed JSON file, creating parent
    /// directories as needed.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a snapshot previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<StateDict> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::param::Param;

    #[test]
    fn snapshot_does_not_alias_live_params() {
        let mut p = Param::new(Matrix::from_data(vec![vec![1.0, 2.0]]));
        let snap = StateDict::from_params(vec![("w".to_string(), &p)]);
        p.value.data[0][0] = 99.0;
        assert_eq!(snap.get("w").unwrap().data[0][0], 1.0);

        snap.restore_into(vec![("w".to_string(), &mut p)]).unwrap();
        p.value.data[0][1] = -5.0;
        assert_eq!(snap.get("w").unwrap().data[0], vec![1.0, 2.0]);
    }

    #[test]
    fn missing_tensor_is_a_state_error() {
        let mut p = Param::new(Matrix::zeros(1, 1));
        let snap = StateDict::default();
        assert!(matches!(
            snap.restore_into(vec![("w".to_string(), &mut p)]),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn malformed_tensor_is_rejected_and_leaves_params_alone() {
        let mut p = Param::new(Matrix::from_data(vec![vec![3.0], vec![4.0]]));
        let snap: StateDict = serde_json::from_str(
            r#"{"tensors": {"w": {"rows": 2, "cols": 1, "data": [[1.0]]}}}"#,
        ).unwrap();
        assert!(matches!(
            snap.restore_into(vec![("w".to_string(), &mut p)]),
            Err(Error::State(_))
        ));
        assert_eq!(p.value.data, vec![vec![3.0], vec![4.0]]);
    }

    #[test]
    fn random_weights_survive_the_file_bit_for_bit() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let mut snap = StateDict::default();
        snap.insert("w", Matrix::he(200, 100, &mut StdRng::seed_from_u64(11)));
        snap.save_json(&path).unwrap();

        let loaded = StateDict::load_json(&path).unwrap();
        let (a, b) = (snap.get("w").unwrap().flatten(), loaded.get("w").unwrap().flatten());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn json_round_trip_preserves_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoint.json");
        let mut snap = StateDict::default();
        snap.insert("w", Matrix::from_data(vec![vec![0.1, -1.0 / 3.0]]));
        snap.save_json(&path).unwrap();
        assert_eq!(StateDict::load_json(&path).unwrap(), snap);
    }
}
