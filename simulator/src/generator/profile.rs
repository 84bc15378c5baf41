use anyhow::{ensure, Context};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trackcore::map::StaticNode;
use trackcore::query::Detection;

/// Configuration for generating synthetic tire-sensor detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionProfile {
    pub count: usize,
    pub vehicles: usize,
    pub seed: u64,
    pub sensor_models: Vec<String>,
    pub car_models: Vec<String>,
    /// Degrees of random offset around the node a detection is placed at.
    pub jitter_deg: f64,
    /// Share of detections written without coordinates, in [0, 1].
    pub missing_coordinates: f64,
    /// Epoch seconds of the first detection.
    pub start_epoch_secs: i64,
    pub spacing_secs: i64,
}

impl Default for DetectionProfile {
    fn default() -> Self {
        Self {
            count: 40,
            vehicles: 6,
            seed: 0,
            sensor_models: vec![
                "Schrader-3039".into(),
                "Continental-VDO".into(),
                "Huf-IntelliSens".into(),
            ],
            car_models: vec![
                "Sedan".into(),
                "SUV".into(),
                "Pickup".into(),
                "Hatchback".into(),
            ],
            jitter_deg: 0.0002,
            missing_coordinates: 0.0,
            start_epoch_secs: 1_735_725_600,
            spacing_secs: 90,
        }
    }
}

impl DetectionProfile {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.vehicles > 0, "profile needs at least one vehicle");
        ensure!(!self.sensor_models.is_empty(), "profile needs at least one sensor model");
        ensure!(!self.car_models.is_empty(), "profile needs at least one car model");
        ensure!(
            (0.0..=1.0).contains(&self.missing_coordinates),
            "missing_coordinates share {} is outside [0, 1]",
            self.missing_coordinates
        );
        Ok(())
    }
}

/// One simulated car with four tire sensors of the same model.
struct Vehicle {
    tire_ids: [String; 4],
    sensor_model: String,
    car_model: String,
}

fn build_fleet(profile: &DetectionProfile, rng: &mut StdRng) -> Vec<Vehicle> {
    (0..profile.vehicles)
        .map(|index| {
            let sensor_model = profile
                .sensor_models
                .choose(rng)
                .cloned()
                .unwrap_or_default();
            let car_model = profile.car_models.choose(rng).cloned().unwrap_or_default();
            Vehicle {
                tire_ids: std::array::from_fn(|tire| format!("T{}", index * 4 + tire + 1)),
                sensor_model,
                car_model,
            }
        })
        .collect()
}

/// Places `profile.count` detections at random nodes, oldest first.
pub fn generate_detections(
    profile: &DetectionProfile,
    nodes: &[StaticNode],
) -> anyhow::Result<Vec<Detection>> {
    profile.validate()?;
    ensure!(!nodes.is_empty(), "cannot place detections without nodes");

    let mut rng = StdRng::seed_from_u64(profile.seed);
    let fleet = build_fleet(profile, &mut rng);
    let mut detections = Vec::with_capacity(profile.count);

    for index in 0..profile.count {
        let vehicle = &fleet[rng.gen_range(0..fleet.len())];
        let node = nodes
            .choose(&mut rng)
            .context("choosing a node for a detection")?;
        let tire = &vehicle.tire_ids[rng.gen_range(0..4)];
        let offset = profile.spacing_secs.saturating_mul(index as i64);
        let (latitude, longitude) = if rng.gen_bool(profile.missing_coordinates) {
            (None, None)
        } else {
            let jitter = profile.jitter_deg.abs();
            let mut wobble = || {
                if jitter > 0.0 {
                    rng.gen_range(-jitter..=jitter)
                } else {
                    0.0
                }
            };
            (Some(node.latitude + wobble()), Some(node.longitude + wobble()))
        };

        detections.push(Detection {
            id: (index + 1).to_string(),
            timestamp: format_rfc3339(profile.start_epoch_secs.saturating_add(offset)),
            tpms_id: tire.clone(),
            tpms_model: vehicle.sensor_model.clone(),
            car_model: vehicle.car_model.clone(),
            location: node.id.clone(),
            latitude,
            longitude,
        });
    }
    Ok(detections)
}

/// `YYYY-MM-DDTHH:MM:SSZ` for a UTC epoch second.
pub fn format_rfc3339(epoch_secs: i64) -> String {
    let days = epoch_secs.div_euclid(86_400);
    let secs = epoch_secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
