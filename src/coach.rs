//! One-line coaching hint derived from the fused state

use crate::energy::EnergySnapshot;
use crate::face::Mood;

const LOW_CHANNEL: f64 = 0.3;
const BALANCED_CHANNEL: f64 = 0.7;

/// Pick the hint for this tick.
///
/// Priority: Gyan active, alignment running, a depleted channel, everything
/// charged, then the generic strongest/weakest hint.
pub fn coach_message(energy: &EnergySnapshot, mood: Mood, gyan_active: bool) -> String {
    if gyan_active {
        return "Gyan Mudra detected. Deep Meditation Mode.".to_string();
    }
    if energy.alignment_active {
        return "Alignment Mode: all channels are being gently balanced...".to_string();
    }

    let weakest = energy.weakest();
    let strongest = energy.strongest();
    if energy.get(weakest) < LOW_CHANNEL {
        return format!(
            "Tip: {} is low. Try its gesture to recharge. ({})",
            weakest.as_str(),
            mood.as_str()
        );
    }
    if energy.energies.iter().all(|e| *e > BALANCED_CHANNEL) {
        return format!(
            "Beautiful! Your energy looks balanced. Stay with your breath. ({})",
            mood.as_str()
        );
    }
    format!(
        "Focus on breath. {} is strong, {} needs love. ({})",
        strongest.as_str(),
        weakest.as_str(),
        mood.as_str()
    )
}
