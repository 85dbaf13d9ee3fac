use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

use crate::error::{Result, RlError};

/// Converts a `[N, M]` tensor into `N` rows of `f64`.
pub fn tensor_rows(t: &Tensor) -> Result<Vec<Vec<f64>>> {
    let (n, m) = t.size2()?;
    let flat = t.to_kind(Kind::Double).contiguous().view([-1]);
    let data = Vec::<f64>::try_from(&flat)?;
    if n == 0 || m == 0 {
        return Ok(vec![Vec::new(); n as usize]);
    }
    Ok(data.chunks(m as usize).map(|row| row.to_vec()).collect())
}

/// Reads a `[N, 1]` (or `[N]`) index tensor as int64 values.
pub fn tensor_indices(t: &Tensor) -> Result<Vec<i64>> {
    let flat = t.to_kind(Kind::Int64).contiguous().view([-1]);
    Ok(Vec::<i64>::try_from(&flat)?)
}

/// Serializable stand-in for [`tch::Device`], stored in policy artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda(usize),
    Mps,
}

impl From<Device> for DeviceSpec {
    fn from(device: Device) -> Self {
        match device {
            Device::Cuda(i) => DeviceSpec::Cuda(i),
            Device::Mps => DeviceSpec::Mps,
            _ => DeviceSpec::Cpu,
        }
    }
}

impl From<DeviceSpec> for Device {
    fn from(spec: DeviceSpec) -> Self {
        match spec {
            DeviceSpec::Cpu => Device::Cpu,
            DeviceSpec::Cuda(i) => Device::Cuda(i),
            DeviceSpec::Mps => Device::Mps,
        }
    }
}

/// Writes tensors into an opaque in-memory blob.
pub fn tensors_to_blob(named: &[(&str, &Tensor)]) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    Tensor::save_multi_to_stream(named, &mut blob)?;
    Ok(blob)
}

/// Reads a blob written by [`tensors_to_blob`] and returns the tensor called `name`.
pub fn tensor_from_blob(blob: &[u8], name: &str) -> Result<Tensor> {
    Tensor::load_multi_from_stream(std::io::Cursor::new(blob))?
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, t)| t)
        .ok_or_else(|| RlError::config(format!("tensor '{name}' not found in blob")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_row_major_order() {
        let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).view([2, 3]);
        assert_eq!(
            tensor_rows(&t).unwrap(),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
        );
    }

    #[test]
    fn blob_round_trip() {
        let t = Tensor::from_slice(&[0.1f32, -2.5]).view([1, 2]);
        let blob = tensors_to_blob(&[("q_table", &t)]).unwrap();
        let back = tensor_from_blob(&blob, "q_table").unwrap();
        assert!(back.equal(&t));
        assert!(tensor_from_blob(&blob, "missing").is_err());
    }

    #[test]
    fn device_spec_serializes_by_name() {
        assert_eq!(serde_json::to_string(&DeviceSpec::Cpu).unwrap(), "\"cpu\"");
        assert_eq!(Device::from(DeviceSpec::Cuda(1)), Device::Cuda(1));
    }
}
