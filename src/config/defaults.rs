use std::path::PathBuf;

/// The only config layout this build understands
pub const CONFIG_VERSION: u32 = 1;

pub fn default_version() -> u32 {
    CONFIG_VERSION
}

pub fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    5002
}

pub fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

pub fn default_max_requests() -> u32 {
    100
}

pub fn default_window_ms() -> u64 {
    15 * 60 * 1000 // 15 minutes
}

pub fn default_sweep_interval_sec() -> u64 {
    60
}

pub fn default_interpreter() -> PathBuf {
    PathBuf::from("python")
}

pub fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

pub fn default_timeout_sec() -> u64 {
    120
}

pub fn default_kharif_script() -> PathBuf {
    PathBuf::from("kharif_model/predict_kharif.py")
}

pub fn default_kharif_artifacts() -> Vec<PathBuf> {
    vec![
        PathBuf::from("kharif_model.pkl"),
        PathBuf::from("kharif_data.csv"),
    ]
}

pub fn default_rabi_script() -> PathBuf {
    PathBuf::from("rabi_model/predict_rabi.py")
}

pub fn default_rabi_artifacts() -> Vec<PathBuf> {
    vec![PathBuf::from("rabi_model.pkl"), PathBuf::from("rabi_data.csv")]
}

pub fn default_true() -> bool {
    true
}
