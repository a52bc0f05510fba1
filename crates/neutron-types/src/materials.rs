// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Multigroup Cross Sections
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-material, per-group macroscopic cross sections.
//!
//! Scattering is stored as `Σs[from][to]`: row = source group, column =
//! destination group. Σt is never read from input; it is derived as
//! Σa + Σ_to Σs[g][to] so the balance invariant holds exactly.

use ndarray::{Array2, Array3, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Raw input record for one material, all vectors indexed by group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub name: String,
    pub sig_a: Vec<f64>,
    /// `scattering[from][to]`
    pub scattering: Vec<Vec<f64>>,
    #[serde(default)]
    pub sig_f: Vec<f64>,
    #[serde(default)]
    pub nu: Vec<f64>,
    #[serde(default)]
    pub chi: Vec<f64>,
}

/// JSON layout: `{ "materials": [ ... ] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSectionFile {
    pub materials: Vec<MaterialData>,
}

/// Immutable multigroup cross-section library.
#[derive(Debug, Clone)]
pub struct CrossSectionSet {
    names: Vec<String>,
    num_groups: usize,
    sig_t: Array2<f64>,
    sig_a: Array2<f64>,
    sig_f: Array2<f64>,
    nu: Array2<f64>,
    chi: Array2<f64>,
    diffusion: Array2<f64>,
    inv_sig_t: Array2<f64>,
    /// [material, from, to]
    scattering: Array3<f64>,
}

fn check_len(name: &str, field: &str, len: usize, groups: usize) -> TransportResult<()> {
    if len != groups {
        return Err(TransportError::ConfigError(format!(
            "material '{name}': {field} has {len} entries, expected {groups}"
        )));
    }
    Ok(())
}

fn check_value(name: &str, field: &str, group: usize, value: f64) -> TransportResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(TransportError::ConfigError(format!(
            "material '{name}': {field}[{group}] = {value} must be finite and non-negative"
        )));
    }
    Ok(())
}

impl CrossSectionSet {
    /// Validate raw records and derive Σt, D and 1/Σt.
    ///
    /// Missing fission data (empty `sig_f`/`nu`/`chi`) is read as a
    /// non-fissile material.
    pub fn new(materials: Vec<MaterialData>) -> TransportResult<Self> {
        let first = materials.first().ok_or_else(|| {
            TransportError::ConfigError("cross-section set has no materials".to_string())
        })?;
        let num_groups = first.sig_a.len();
        if num_groups == 0 {
            return Err(TransportError::ConfigError(format!(
                "material '{}' has zero energy groups",
                first.name
            )));
        }
        let num_mats = materials.len();

        let mut names = Vec::with_capacity(num_mats);
        let mut sig_t = Array2::zeros((num_mats, num_groups));
        let mut sig_a = Array2::zeros((num_mats, num_groups));
        let mut sig_f = Array2::zeros((num_mats, num_groups));
        let mut nu = Array2::zeros((num_mats, num_groups));
        let mut chi = Array2::zeros((num_mats, num_groups));
        let mut diffusion = Array2::zeros((num_mats, num_groups));
        let mut inv_sig_t = Array2::zeros((num_mats, num_groups));
        let mut scattering = Array3::zeros((num_mats, num_groups, num_groups));

        for (m, mat) in materials.into_iter().enumerate() {
            let name = mat.name.as_str();
            check_len(name, "sig_a", mat.sig_a.len(), num_groups)?;
            check_len(name, "scattering", mat.scattering.len(), num_groups)?;
            let fissile_data = !(mat.sig_f.is_empty() && mat.nu.is_empty() && mat.chi.is_empty());
            if fissile_data {
                check_len(name, "sig_f", mat.sig_f.len(), num_groups)?;
                check_len(name, "nu", mat.nu.len(), num_groups)?;
                check_len(name, "chi", mat.chi.len(), num_groups)?;
            }

            for g in 0..num_groups {
                let row = &mat.scattering[g];
                check_len(name, &format!("scattering[{g}]"), row.len(), num_groups)?;
                check_value(name, "sig_a", g, mat.sig_a[g])?;
                let mut out_scatter = 0.0;
                for (to, &s) in row.iter().enumerate() {
                    check_value(name, &format!("scattering[{g}]"), to, s)?;
                    scattering[[m, g, to]] = s;
                    out_scatter += s;
                }

                let total = mat.sig_a[g] + out_scatter;
                if total <= 0.0 {
                    return Err(TransportError::ConfigError(format!(
                        "material '{name}': total cross section of group {g} is zero"
                    )));
                }
                sig_a[[m, g]] = mat.sig_a[g];
                sig_t[[m, g]] = total;
                diffusion[[m, g]] = 1.0 / (3.0 * total);
                inv_sig_t[[m, g]] = 1.0 / total;

                if fissile_data {
                    check_value(name, "sig_f", g, mat.sig_f[g])?;
                    check_value(name, "nu", g, mat.nu[g])?;
                    check_value(name, "chi", g, mat.chi[g])?;
                    sig_f[[m, g]] = mat.sig_f[g];
                    nu[[m, g]] = mat.nu[g];
                    chi[[m, g]] = mat.chi[g];
                }
            }
            names.push(mat.name);
        }

        Ok(CrossSectionSet {
            names,
            num_groups,
            sig_t,
            sig_a,
            sig_f,
            nu,
            chi,
            diffusion,
            inv_sig_t,
            scattering,
        })
    }

    /// Load the pipe-delimited library format from disk.
    pub fn from_file(path: &str) -> TransportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_pipe(&contents)
    }

    /// Load the JSON library format from disk.
    pub fn from_json_file(path: &str) -> TransportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: CrossSectionFile = serde_json::from_str(&contents)?;
        Self::new(file.materials)
    }

    /// Parse the pipe-delimited format.
    ///
    /// ```text
    /// num_mats|num_groups
    /// mat|group|name|label|sig_a|s_g0 s_g1 ...|sig_f|nu|chi
    /// ```
    /// One line per (material, group), groups contiguous within a material.
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse_pipe(text: &str) -> TransportResult<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let (header_no, header) = lines.next().ok_or_else(|| {
            TransportError::ConfigError("cross-section file is empty".to_string())
        })?;
        let counts: Vec<&str> = header.split('|').map(str::trim).collect();
        if counts.len() < 2 {
            return Err(TransportError::ConfigError(format!(
                "line {header_no}: header must be 'num_mats|num_groups'"
            )));
        }
        let num_mats = parse_usize(counts[0], header_no, "num_mats")?;
        let num_groups = parse_usize(counts[1], header_no, "num_groups")?;
        if num_mats == 0 || num_groups == 0 {
            return Err(TransportError::ConfigError(format!(
                "line {header_no}: material and group counts must be positive"
            )));
        }

        let mut materials = Vec::with_capacity(num_mats);
        for m in 0..num_mats {
            let mut data = MaterialData {
                name: String::new(),
                sig_a: Vec::with_capacity(num_groups),
                scattering: Vec::with_capacity(num_groups),
                sig_f: Vec::with_capacity(num_groups),
                nu: Vec::with_capacity(num_groups),
                chi: Vec::with_capacity(num_groups),
            };
            for g in 0..num_groups {
                let (line_no, line) = lines.next().ok_or_else(|| {
                    TransportError::ConfigError(format!(
                        "cross-section file ends before material {m} group {g}"
                    ))
                })?;
                let fields: Vec<&str> = line.split('|').map(str::trim).collect();
                if fields.len() < 9 {
                    return Err(TransportError::ConfigError(format!(
                        "line {line_no}: expected 9 '|'-separated fields, found {}",
                        fields.len()
                    )));
                }
                let mat_id = parse_usize(fields[0], line_no, "material index")?;
                let group_id = parse_usize(fields[1], line_no, "group index")?;
                if mat_id != m || group_id != g {
                    return Err(TransportError::ConfigError(format!(
                        "line {line_no}: expected material {m} group {g}, found {mat_id}/{group_id}"
                    )));
                }
                if g == 0 {
                    data.name = fields[2].to_string();
                }
                data.sig_a.push(parse_f64(fields[4], line_no, "sig_a")?);
                let row = fields[5]
                    .split_whitespace()
                    .map(|s| parse_f64(s, line_no, "scattering"))
                    .collect::<TransportResult<Vec<f64>>>()?;
                if row.len() != num_groups {
                    return Err(TransportError::ConfigError(format!(
                        "line {line_no}: scattering row has {} entries, expected {num_groups}",
                        row.len()
                    )));
                }
                data.scattering.push(row);
                data.sig_f.push(parse_f64(fields[6], line_no, "sig_f")?);
                data.nu.push(parse_f64(fields[7], line_no, "nu")?);
                data.chi.push(parse_f64(fields[8], line_no, "chi")?);
            }
            materials.push(data);
        }

        if let Some((line_no, _)) = lines.next() {
            return Err(TransportError::ConfigError(format!(
                "line {line_no}: trailing data after {num_mats}x{num_groups} records"
            )));
        }
        Self::new(materials)
    }

    pub fn num_materials(&self) -> usize {
        self.names.len()
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn name(&self, mat: usize) -> &str {
        &self.names[mat]
    }

    pub fn sig_t(&self, mat: usize, group: usize) -> f64 {
        self.sig_t[[mat, group]]
    }

    pub fn sig_a(&self, mat: usize, group: usize) -> f64 {
        self.sig_a[[mat, group]]
    }

    pub fn sig_f(&self, mat: usize, group: usize) -> f64 {
        self.sig_f[[mat, group]]
    }

    pub fn nu(&self, mat: usize, group: usize) -> f64 {
        self.nu[[mat, group]]
    }

    pub fn nu_sig_f(&self, mat: usize, group: usize) -> f64 {
        self.nu[[mat, group]] * self.sig_f[[mat, group]]
    }

    pub fn chi(&self, mat: usize, group: usize) -> f64 {
        self.chi[[mat, group]]
    }

    /// D = 1 / (3 Σt)
    pub fn diffusion(&self, mat: usize, group: usize) -> f64 {
        self.diffusion[[mat, group]]
    }

    pub fn inv_sig_t(&self, mat: usize, group: usize) -> f64 {
        self.inv_sig_t[[mat, group]]
    }

    /// Σs[from][to] for one material.
    pub fn scattering(&self, mat: usize) -> ArrayView2<'_, f64> {
        self.scattering.slice(ndarray::s![mat, .., ..])
    }

    pub fn sig_s(&self, mat: usize, from: usize, to: usize) -> f64 {
        self.scattering[[mat, from, to]]
    }

    /// Removal: Σr = Σt − Σs[g][g].
    pub fn sig_r(&self, mat: usize, group: usize) -> f64 {
        self.sig_t[[mat, group]] - self.scattering[[mat, group, group]]
    }

    /// Any transfer from a higher group index to a lower one.
    pub fn has_upscatter(&self, mat: usize) -> bool {
        (0..self.num_groups)
            .any(|from| (0..from).any(|to| self.scattering[[mat, from, to]] > 0.0))
    }

    pub fn any_upscatter(&self) -> bool {
        (0..self.num_materials()).any(|m| self.has_upscatter(m))
    }

    /// True if some material scatters at all (including self-scatter).
    pub fn scatters_any(&self) -> bool {
        self.scattering.iter().any(|&s| s != 0.0)
    }

    pub fn is_fissile(&self, mat: usize) -> bool {
        (0..self.num_groups).any(|g| self.nu_sig_f(mat, g) > 0.0)
    }

    pub fn has_fission(&self) -> bool {
        (0..self.num_materials()).any(|m| self.is_fissile(m))
    }
}

fn parse_usize(field: &str, line_no: usize, what: &str) -> TransportResult<usize> {
    field.parse::<usize>().map_err(|_| {
        TransportError::ConfigError(format!("line {line_no}: invalid {what} '{field}'"))
    })
}

fn parse_f64(field: &str, line_no: usize, what: &str) -> TransportResult<f64> {
    field.parse::<f64>().map_err(|_| {
        TransportError::ConfigError(format!("line {line_no}: invalid {what} '{field}'"))
    })
}
