use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::data::array::NumericArray;
use crate::error::{Error, Result};

/// Reads the numeric field `field` from a `.mat` (MAT v5) or `.json` file.
///
/// JSON files hold an object keyed by field name whose value is a number or a
/// (nested, rectangular) array of numbers. Nothing is cached: every call goes
/// back to disk.
pub fn load_field(path: impl AsRef<Path>, field: &str) -> Result<NumericArray> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::data_at(path, "file not found"));
    }
    let ext = path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let array = match ext.as_str() {
        "mat" => load_mat_field(path, field)?,
        "json" => load_json_field(path, field)?,
        other => {
            return Err(Error::data_at(
                path,
                format!("unsupported matrix file extension '{}' (expected .mat or .json)", other),
            ))
        }
    };
    debug!("loaded '{}' from {} with shape {:?}", field, path.display(), array.shape());
    Ok(array)
}

/// Loads a sensor-history matrix and reshapes it to `(N, L, 1)`.
pub fn load_sequences(path: impl AsRef<Path>, field: &str) -> Result<NumericArray> {
    let path = path.as_ref();
    let array = load_field(path, field)?;
    let shape = array.shape().to_vec();
    match shape.as_slice() {
        &[n, l] => array.reshape(vec![n, l, 1]),
        &[_, _, 1] => Ok(array),
        other => Err(Error::data_at(
            path,
            format!("field '{}' has shape {:?}, expected (samples, steps)", field, other),
        )),
    }
}

/// Loads a target vector; `(N)`, `(N, 1)` and `(1, N)` layouts are accepted.
pub fn load_targets(path: impl AsRef<Path>, field: &str) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let array = load_field(path, field)?;
    let non_singleton = array.shape().iter().filter(|&&d| d != 1).count();
    if array.shape().is_empty() || non_singleton > 1 {
        return Err(Error::data_at(
            path,
            format!("field '{}' has shape {:?}, expected a vector of targets", field, array.shape()),
        ));
    }
    Ok(array.into_data())
}

fn load_mat_field(path: &Path, field: &str) -> Result<NumericArray> {
    use matfile::NumericData;

    let file = File::open(path).map_err(|e| Error::data_at(path, e))?;
    let mat = matfile::MatFile::parse(BufReader::new(file))
        .map_err(|e| Error::data_at(path, format!("corrupt MAT file: {:?}", e)))?;
    let array = mat.find_by_name(field)
        .ok_or_else(|| Error::data_at(path, format!("no field named '{}'", field)))?;

    let values: Vec<f64> = match array.data() {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
    };
    NumericArray::from_column_major(array.size().to_vec(), values)
        .map_err(|e| Error::data_at(path, e))
}

fn load_json_field(path: &Path, field: &str) -> Result<NumericArray> {
    let file = File::open(path).map_err(|e| Error::data_at(path, e))?;
    let root: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::data_at(path, format!("corrupt JSON file: {}", e)))?;
    let value = root.get(field)
        .ok_or_else(|| Error::data_at(path, format!("no field named '{}'", field)))?;

    let mut shape = Vec::new();
    let mut data = Vec::new();
    flatten_json(value, 0, &mut shape, &mut None, &mut data)
        .map_err(|reason| Error::data_at(path, format!("field '{}': {}", field, reason)))?;
    if shape.iter().product::<usize>() != data.len() {
        return Err(Error::data_at(path, format!("field '{}' is not rectangular", field)));
    }
    NumericArray::new(shape, data)
}

/// Walks nested arrays depth first. `leaf_depth` is the depth of the first
/// number seen; every other number must sit at the same depth and no array
/// may open at or below it.
fn flatten_json(
    value: &Value,
    depth: usize,
    shape: &mut Vec<usize>,
    leaf_depth: &mut Option<usize>,
    out: &mut Vec<f64>,
) -> std::result::Result<(), String> {
    match value {
        Value::Number(n) => {
            if shape.len() != depth || *leaf_depth.get_or_insert(depth) != depth {
                return Err("ragged nesting".into());
            }
            out.push(n.as_f64().ok_or("number out of range")?);
            Ok(())
        }
        Value::Array(items) => {
            if leaf_depth.is_some_and(|leaf| depth >= leaf) {
                return Err("ragged nesting".into());
            }
            if shape.len() == depth {
                shape.push(items.len());
            } else if shape.get(depth) != Some(&items.len()) {
                return Err("rows of different lengths".into());
            }
            items.iter().try_for_each(|item| flatten_json(item, depth + 1, shape, leaf_depth, out))
        }
        other => Err(format!("non-numeric value {}", other)),
    }
}
