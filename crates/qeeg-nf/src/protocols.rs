//! Built-in neurofeedback protocol presets
//!
//! These are starting points and examples only. Protocols in practice vary
//! widely (channels, bands, reward/inhibit choices, thresholds, artifact
//! handling); band edges here follow common conventions and are overridden
//! per preset where those differ from the engine defaults.

use crate::direction::RewardDirection;
use qeeg_core::{QeegError, QeegResult};

/// One protocol preset.
///
/// `metric_template` (and `band_spec`) may contain the placeholders `{ch}`
/// (primary channel), `{a}` and `{b}` (channel pair), substituted at
/// render time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NfProtocolPreset {
    /// Stable machine-readable identifier (lowercase).
    pub name: String,
    pub title: String,
    pub description: String,
    /// Metric spec template, e.g. `"smr:{ch}"` or `"coh:alpha:{a}:{b}"`.
    pub metric_template: String,
    /// Band spec override; empty means the engine defaults.
    pub band_spec: String,
    pub default_channel: String,
    pub default_channel_a: String,
    pub default_channel_b: String,
    pub reward_direction: RewardDirection,
    pub target_reward_rate: f64,
    pub baseline_seconds: f64,
    pub window_seconds: f64,
    pub update_seconds: f64,
    pub metric_smooth_seconds: f64,
}

impl Default for NfProtocolPreset {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            description: String::new(),
            metric_template: String::new(),
            band_spec: String::new(),
            default_channel: String::new(),
            default_channel_a: String::new(),
            default_channel_b: String::new(),
            reward_direction: RewardDirection::Above,
            target_reward_rate: 0.6,
            baseline_seconds: 10.0,
            window_seconds: 2.0,
            update_seconds: 0.25,
            metric_smooth_seconds: 0.5,
        }
    }
}

/// Band spec with the 4-8 Hz theta convention used by several presets.
const THETA48_BANDS: &str = "delta:0.5-4,theta:4-8,alpha:8-12,beta:13-30,gamma:30-80";

/// The built-in protocol list.
pub fn built_in_nf_protocols() -> Vec<NfProtocolPreset> {
    vec![
        NfProtocolPreset {
            name: "alpha_up_pz".into(),
            title: "Alpha uptraining".into(),
            description: "Reward increased alpha (8-12 Hz) bandpower at Pz.".into(),
            metric_template: "alpha:{ch}".into(),
            default_channel: "Pz".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "alpha_up_oz".into(),
            title: "Alpha uptraining (occipital)".into(),
            description: "Reward increased alpha (8-12 Hz) bandpower at Oz.".into(),
            metric_template: "alpha:{ch}".into(),
            default_channel: "Oz".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "theta_down_cz".into(),
            title: "Theta downtraining".into(),
            description: "Reward reduced theta (4-8 Hz) bandpower at Cz.".into(),
            metric_template: "theta:{ch}".into(),
            band_spec: THETA48_BANDS.into(),
            default_channel: "Cz".into(),
            reward_direction: RewardDirection::Below,
            ..Default::default()
        },
        NfProtocolPreset {
            name: "tbr_down_cz".into(),
            title: "Theta/Beta ratio downtraining".into(),
            description: "Reward a lower theta/beta ratio at Cz (theta 4-8 over beta 13-20)."
                .into(),
            metric_template: "theta/beta:{ch}".into(),
            band_spec: "delta:0.5-4,theta:4-8,alpha:8-12,beta:13-20,beta2:20-30,gamma:30-80"
                .into(),
            default_channel: "Cz".into(),
            reward_direction: RewardDirection::Below,
            ..Default::default()
        },
        NfProtocolPreset {
            name: "smr_up_cz".into(),
            title: "SMR uptraining".into(),
            description: "Reward increased SMR (12-15 Hz) bandpower at Cz.".into(),
            metric_template: "smr:{ch}".into(),
            band_spec: "delta:0.5-4,theta:4-8,alpha:8-12,smr:12-15,beta:13-30,gamma:30-80".into(),
            default_channel: "Cz".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "smr_up_c3".into(),
            title: "SMR uptraining (C3)".into(),
            description: "Reward increased SMR (12-15 Hz) bandpower at C3.".into(),
            metric_template: "smr:{ch}".into(),
            band_spec: "delta:0.5-4,theta:4-8,alpha:8-12,smr:12-15,beta:13-30,gamma:30-80".into(),
            default_channel: "C3".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "smr_up_c4".into(),
            title: "SMR uptraining (C4)".into(),
            description: "Reward increased SMR (12-15 Hz) bandpower at C4.".into(),
            metric_template: "smr:{ch}".into(),
            band_spec: "delta:0.5-4,theta:4-8,alpha:8-12,smr:12-15,beta:13-30,gamma:30-80".into(),
            default_channel: "C4".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "beta1_up_cz".into(),
            title: "Beta1 uptraining".into(),
            description: "Reward increased beta1 (15-18 Hz) bandpower at Cz.".into(),
            metric_template: "beta1:{ch}".into(),
            band_spec: "delta:0.5-4,theta:4-8,alpha:8-12,beta1:15-18,beta2:18-30,gamma:30-80"
                .into(),
            default_channel: "Cz".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "hibeta_down_fz".into(),
            title: "High beta downtraining".into(),
            description: "Reward reduced high beta (22-36 Hz) bandpower at Fz.".into(),
            metric_template: "hibeta:{ch}".into(),
            band_spec: "delta:0.5-4,theta:4-8,alpha:8-12,beta:13-21,hibeta:22-36,gamma:30-80"
                .into(),
            default_channel: "Fz".into(),
            reward_direction: RewardDirection::Below,
            ..Default::default()
        },
        NfProtocolPreset {
            name: "alpha_theta_ratio_up_pz".into(),
            title: "Alpha/Theta ratio uptraining".into(),
            description: "Reward increased alpha/theta ratio at Pz.".into(),
            metric_template: "alpha/theta:{ch}".into(),
            band_spec: THETA48_BANDS.into(),
            default_channel: "Pz".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "theta_alpha_ratio_down_pz".into(),
            title: "Theta/Alpha ratio downtraining".into(),
            description: "Reward a lower theta/alpha ratio at Pz.".into(),
            metric_template: "theta/alpha:{ch}".into(),
            band_spec: THETA48_BANDS.into(),
            default_channel: "Pz".into(),
            reward_direction: RewardDirection::Below,
            ..Default::default()
        },
        NfProtocolPreset {
            name: "alpha_coh_up_f3_f4".into(),
            title: "Alpha coherence uptraining".into(),
            description: "Reward increased alpha-band coherence between F3 and F4.".into(),
            metric_template: "coh:alpha:{a}:{b}".into(),
            default_channel_a: "F3".into(),
            default_channel_b: "F4".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "imcoh_alpha_up_f3_f4".into(),
            title: "Alpha imaginary coherency uptraining".into(),
            description: "Reward increased alpha-band imaginary coherency between F3 and F4."
                .into(),
            metric_template: "imcoh:alpha:{a}:{b}".into(),
            default_channel_a: "F3".into(),
            default_channel_b: "F4".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "alpha_asym_f4_f3".into(),
            title: "Alpha asymmetry (F4/F3)".into(),
            description: "Reward increased alpha-band asymmetry computed as log-power ratio \
                          between F4 and F3 (log10(P(F4)/P(F3)))."
                .into(),
            metric_template: "asym:alpha:{a}:{b}".into(),
            band_spec: THETA48_BANDS.into(),
            default_channel_a: "F4".into(),
            default_channel_b: "F3".into(),
            ..Default::default()
        },
        NfProtocolPreset {
            name: "pac_theta_gamma_up_cz".into(),
            title: "Theta->Gamma PAC uptraining".into(),
            description: "Reward increased theta-phase to gamma-amplitude PAC at Cz (Tort MI)."
                .into(),
            metric_template: "pac:theta:gamma:{ch}".into(),
            band_spec: THETA48_BANDS.into(),
            default_channel: "Cz".into(),
            // PAC estimates need longer windows.
            window_seconds: 4.0,
            ..Default::default()
        },
        NfProtocolPreset {
            name: "mvl_theta_gamma_up_cz".into(),
            title: "Theta->Gamma coupling uptraining (MVL)".into(),
            description: "Reward increased theta-phase to gamma-amplitude coupling at Cz (MVL)."
                .into(),
            metric_template: "mvl:theta:gamma:{ch}".into(),
            band_spec: THETA48_BANDS.into(),
            default_channel: "Cz".into(),
            window_seconds: 4.0,
            ..Default::default()
        },
    ]
}

/// Case-insensitive preset lookup by name.
pub fn find_nf_protocol_preset(name: &str) -> Option<NfProtocolPreset> {
    let key = name.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    built_in_nf_protocols()
        .into_iter()
        .find(|p| p.name.to_lowercase() == key)
}

fn apply_placeholders(
    template: &str,
    ch: &str,
    a: &str,
    b: &str,
    label: &str,
) -> QeegResult<String> {
    let needs_ch = template.contains("{ch}") || template.contains("{channel}");
    if needs_ch && ch.is_empty() {
        return Err(QeegError::invalid_param(format!(
            "{label} requires a channel override"
        )));
    }
    if template.contains("{a}") && a.is_empty() {
        return Err(QeegError::invalid_param(format!(
            "{label} requires channel A override"
        )));
    }
    if template.contains("{b}") && b.is_empty() {
        return Err(QeegError::invalid_param(format!(
            "{label} requires channel B override"
        )));
    }
    Ok(template
        .replace("{ch}", ch)
        .replace("{channel}", ch)
        .replace("{a}", a)
        .replace("{b}", b))
}

impl NfProtocolPreset {
    /// Render the metric spec, preferring overrides over the preset
    /// defaults.
    pub fn render_metric(
        &self,
        channel_override: Option<&str>,
        channel_a_override: Option<&str>,
        channel_b_override: Option<&str>,
    ) -> QeegResult<String> {
        let ch = channel_override.unwrap_or(&self.default_channel);
        let a = channel_a_override.unwrap_or(&self.default_channel_a);
        let b = channel_b_override.unwrap_or(&self.default_channel_b);
        apply_placeholders(
            &self.metric_template,
            ch,
            a,
            b,
            &format!("protocol '{}' metric", self.name),
        )
    }

    /// Render the band spec (placeholder-capable, though the built-ins do
    /// not use placeholders here). Empty means engine defaults.
    pub fn render_bands(
        &self,
        channel_override: Option<&str>,
        channel_a_override: Option<&str>,
        channel_b_override: Option<&str>,
    ) -> QeegResult<String> {
        if self.band_spec.is_empty() {
            return Ok(String::new());
        }
        let ch = channel_override.unwrap_or(&self.default_channel);
        let a = channel_a_override.unwrap_or(&self.default_channel_a);
        let b = channel_b_override.unwrap_or(&self.default_channel_b);
        apply_placeholders(
            &self.band_spec,
            ch,
            a,
            b,
            &format!("protocol '{}' bands", self.name),
        )
    }
}
