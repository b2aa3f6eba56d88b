//! Month-by-month animation timeline.
//!
//! Every accident appears as a large, opaque circle at the start of the
//! month before it happened and shrinks and fades over `steps` days until it
//! settles at the minimum size. Settled circles stay on the map for the rest
//! of the animation. Frames are the distinct days on which some circle is
//! changing.

use bridge_accidents_accident_models::{ClassifiedRecord, ConstructionState, ConstructionWindow};
use bridge_accidents_study::definition::AnimationConfig;
use chrono::{Datelike, Days, Months, NaiveDate};

/// Radius and opacity decay settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayParams {
    /// Number of decay steps; a circle appears in `steps + 1` frames.
    pub steps: u32,
    /// Radius when a circle appears.
    pub radius_max: f64,
    /// Radius once settled.
    pub radius_min: f64,
    /// Opacity when a circle appears.
    pub opacity_max: f64,
    /// Opacity once settled.
    pub opacity_min: f64,
}

impl From<&AnimationConfig> for DecayParams {
    fn from(cfg: &AnimationConfig) -> Self {
        Self {
            steps: cfg.steps,
            radius_max: cfg.radius_max,
            radius_min: cfg.radius_min,
            opacity_max: cfg.opacity_max,
            opacity_min: cfg.opacity_min,
        }
    }
}

/// One day in the life of a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayStep {
    /// Frame date.
    pub date: NaiveDate,
    /// Circle radius in meters.
    pub radius: f64,
    /// Fill opacity.
    pub opacity: f64,
    /// `true` on the final step, after which the circle persists.
    pub settled: bool,
}

/// An accident drawn at a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// The accident.
    pub record: ClassifiedRecord,
    /// Radius in meters.
    pub radius: f64,
    /// Fill opacity.
    pub opacity: f64,
}

/// The circles changing on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame date.
    pub date: NaiveDate,
    /// Circles drawn in this frame, smallest radius first.
    pub circles: Vec<Circle>,
    /// Number of entries of [`FrameSchedule::settled`] shown under this
    /// frame's circles.
    pub settled_before: usize,
}

impl Frame {
    /// Month label shown on the map, e.g. `2007-01`.
    #[must_use]
    pub fn label(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

/// Ordered frames plus the circles that settle along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSchedule {
    /// Frames in date order.
    pub frames: Vec<Frame>,
    /// Settled circles in the order they settled.
    pub settled: Vec<Circle>,
}

impl FrameSchedule {
    /// Settled circles drawn beneath `frame`.
    #[must_use]
    pub fn settled_for(&self, frame: &Frame) -> &[Circle] {
        &self.settled[..frame.settled_before.min(self.settled.len())]
    }

    /// Frame dates in order.
    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.frames.iter().map(|f| f.date).collect()
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Lists the first day of every month from `first` to `last`, skipping
/// months that start inside the construction window.
#[must_use]
pub fn month_starts(
    first: NaiveDate,
    last: NaiveDate,
    window: &ConstructionWindow,
) -> Vec<NaiveDate> {
    let last = month_start(last);
    let mut months = Vec::new();
    let mut current = month_start(first);

    while current <= last {
        if window.is_in_scope(current) {
            months.push(current);
        }
        match current.checked_add_months(Months::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }

    months
}

/// Returns `true` if `date` falls on the same side of `split` as `state`.
fn same_side(date: NaiveDate, state: ConstructionState, split: NaiveDate) -> bool {
    match state {
        ConstructionState::Before => date < split,
        ConstructionState::After => date >= split,
    }
}

/// The month start at which `record` first appears: the latest entry of
/// `months` strictly before the record date on the record's side of
/// `split`, or the record date itself when there is none.
#[must_use]
pub fn born_month(record: &ClassifiedRecord, months: &[NaiveDate], split: NaiveDate) -> NaiveDate {
    months
        .iter()
        .rev()
        .copied()
        .find(|&m| m < record.record.date && same_side(m, record.state, split))
        .unwrap_or(record.record.date)
}

/// The `steps + 1` decay entries for one record, one day apart, starting at
/// its born month with radius and opacity decaying linearly from max to
/// min.
#[must_use]
pub fn decay_steps(
    record: &ClassifiedRecord,
    months: &[NaiveDate],
    params: &DecayParams,
    split: NaiveDate,
) -> Vec<DecayStep> {
    let born = born_month(record, months, split);
    let steps = params.steps.max(1);
    let radius_step = (params.radius_max - params.radius_min) / f64::from(steps);
    let opacity_step = (params.opacity_max - params.opacity_min) / f64::from(steps);

    (0..=steps)
        .map(|i| {
            let settled = i == steps;
            let k = f64::from(i);
            DecayStep {
                date: born
                    .checked_add_days(Days::new(u64::from(i)))
                    .unwrap_or(born),
                radius: if settled {
                    params.radius_min
                } else {
                    params.radius_max - radius_step * k
                },
                opacity: if settled {
                    params.opacity_min
                } else {
                    params.opacity_max - opacity_step * k
                },
                settled,
            }
        })
        .collect()
}

/// Groups every record's decay steps into frames by date.
///
/// Within a frame, circles are ordered by radius, smallest first. Circles
/// that reach their final step in a frame are drawn there and then carried
/// into the settled layer of every later frame.
#[must_use]
pub fn frame_schedule(
    classified: &[ClassifiedRecord],
    months: &[NaiveDate],
    params: &DecayParams,
    split: NaiveDate,
) -> FrameSchedule {
    let mut steps: Vec<(DecayStep, &ClassifiedRecord)> = classified
        .iter()
        .flat_map(|c| {
            decay_steps(c, months, params, split)
                .into_iter()
                .map(move |s| (s, c))
        })
        .collect();
    steps.sort_by(|(a, _), (b, _)| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.radius.total_cmp(&b.radius))
    });

    let mut schedule = FrameSchedule::default();
    let mut pending: Vec<Circle> = Vec::new();

    for (step, record) in steps {
        let circle = Circle {
            record: *record,
            radius: step.radius,
            opacity: step.opacity,
        };

        if schedule.frames.last().is_none_or(|f| f.date != step.date) {
            schedule.settled.append(&mut pending);
            schedule.frames.push(Frame {
                date: step.date,
                circles: Vec::new(),
                settled_before: schedule.settled.len(),
            });
        }
        if let Some(frame) = schedule.frames.last_mut() {
            frame.circles.push(circle);
        }
        if step.settled {
            pending.push(circle);
        }
    }
    schedule.settled.append(&mut pending);

    log::info!(
        "{} frames for {} accidents over {} months",
        schedule.frames.len(),
        classified.len(),
        months.len()
    );

    schedule
}

/// Per-frame delays in hundredths of a second.
///
/// Uniform delays give every frame `frame_delay`. Weighted delays scale the
/// day gap to the next frame so the whole animation runs for about
/// `runtime`; the largest gap is replaced by `gap_days` and the final frame
/// counts as `final_days`. Either way the last frame before `split` gets
/// `pause_delay`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn frame_delays(
    dates: &[NaiveDate],
    cfg: &AnimationConfig,
    split: NaiveDate,
    weighted: bool,
) -> Vec<u32> {
    let mut delays: Vec<u32> = if weighted && !dates.is_empty() {
        let mut gaps: Vec<f64> = dates
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days().unsigned_abs() as f64)
            .collect();

        let largest = gaps.iter().copied().fold(0.0_f64, f64::max);
        for gap in &mut gaps {
            if (*gap - largest).abs() < f64::EPSILON {
                *gap = f64::from(cfg.gap_days);
            }
        }
        gaps.push(f64::from(cfg.final_days));

        let total: f64 = gaps.iter().sum();
        let scale = if total > 0.0 {
            f64::from(cfg.runtime) / total
        } else {
            1.0
        };
        gaps.iter()
            .map(|g| (g * scale).round().max(1.0) as u32)
            .collect()
    } else {
        vec![cfg.frame_delay; dates.len()]
    };

    if let Some(pause) = dates.iter().rposition(|&d| d < split) {
        delays[pause] = cfg.pause_delay;
    }

    delays
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::{AccidentRecord, PeriodLabel, SeverityCode};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn split() -> NaiveDate {
        date(2011, 1, 1)
    }

    fn window() -> ConstructionWindow {
        ConstructionWindow::new(date(2011, 1, 1), date(2016, 4, 1)).unwrap()
    }

    fn months() -> Vec<NaiveDate> {
        month_starts(date(2007, 1, 1), date(2018, 12, 1), &window())
    }

    fn params() -> DecayParams {
        DecayParams::from(&AnimationConfig::default())
    }

    fn classified(date: NaiveDate, lon: f64) -> ClassifiedRecord {
        ClassifiedRecord {
            record: AccidentRecord {
                date,
                latitude: 44.946,
                longitude: lon,
                severity: Some(SeverityCode(1)),
            },
            state: if date < split() {
                ConstructionState::Before
            } else {
                ConstructionState::After
            },
            period: PeriodLabel::from_date(date),
        }
    }

    #[test]
    fn month_starts_skip_construction() {
        let months = months();
        assert_eq!(months.len(), 48 + 32);
        assert_eq!(months[0], date(2007, 1, 1));
        assert_eq!(months[47], date(2010, 12, 1));
        assert_eq!(months[48], date(2016, 5, 1));
        assert_eq!(*months.last().unwrap(), date(2018, 12, 1));
        assert!(!months.contains(&date(2016, 4, 1)));
    }

    #[test]
    fn month_starts_normalize_mid_month_bounds() {
        let months = month_starts(date(2007, 1, 15), date(2007, 3, 20), &window());
        assert_eq!(months, [date(2007, 1, 1), date(2007, 2, 1), date(2007, 3, 1)]);
    }

    #[test]
    fn decays_linearly_from_born_month() {
        let steps = decay_steps(&classified(date(2007, 1, 28), -93.0789), &months(), &params(), split());
        assert_eq!(steps.len(), 5);

        let dates: Vec<NaiveDate> = steps.iter().map(|s| s.date).collect();
        assert_eq!(
            dates,
            [
                date(2007, 1, 1),
                date(2007, 1, 2),
                date(2007, 1, 3),
                date(2007, 1, 4),
                date(2007, 1, 5)
            ]
        );

        let radii = [60.0, 49.25, 38.5, 27.75, 17.0];
        let opacities = [0.9, 0.75, 0.6, 0.45, 0.3];
        for (i, s) in steps.iter().enumerate() {
            assert!((s.radius - radii[i]).abs() < 1e-9, "radius {i}: {}", s.radius);
            assert!((s.opacity - opacities[i]).abs() < 1e-9, "opacity {i}: {}", s.opacity);
            assert_eq!(s.settled, i == 4);
        }
    }

    #[test]
    fn born_month_stays_on_record_side() {
        let months = months();
        assert_eq!(
            born_month(&classified(date(2010, 12, 28), 0.0), &months, split()),
            date(2010, 12, 1)
        );
        assert_eq!(
            born_month(&classified(date(2016, 4, 3), 0.0), &months, split()),
            date(2016, 4, 3)
        );
        assert_eq!(
            born_month(&classified(date(2016, 5, 2), 0.0), &months, split()),
            date(2016, 5, 1)
        );
        assert_eq!(
            born_month(&classified(date(2007, 1, 1), 0.0), &months, split()),
            date(2007, 1, 1)
        );
    }

    #[test]
    fn schedule_groups_by_date_and_settles() {
        let records = [
            classified(date(2007, 1, 10), -93.01),
            classified(date(2007, 1, 20), -93.02),
            classified(date(2007, 3, 5), -93.03),
        ];
        let schedule = frame_schedule(&records, &months(), &params(), split());

        assert_eq!(schedule.frames.len(), 10);
        assert_eq!(schedule.settled.len(), 3);

        let first = &schedule.frames[0];
        assert_eq!(first.date, date(2007, 1, 1));
        assert_eq!(first.circles.len(), 2);
        assert_eq!(first.settled_before, 0);
        assert_eq!(first.label(), "2007-01");

        let settling = &schedule.frames[4];
        assert_eq!(settling.date, date(2007, 1, 5));
        assert!(settling.circles.iter().all(|c| (c.radius - 17.0).abs() < 1e-9));
        assert_eq!(settling.settled_before, 0);

        let march = &schedule.frames[5];
        assert_eq!(march.date, date(2007, 3, 1));
        assert_eq!(march.settled_before, 2);
        assert_eq!(schedule.settled_for(march).len(), 2);
        assert_eq!(march.circles.len(), 1);
    }

    #[test]
    fn frame_circles_sorted_by_radius() {
        let records = [
            classified(date(2007, 1, 10), -93.01),
            classified(date(2007, 1, 2), -93.02),
        ];
        let schedule = frame_schedule(&records, &months(), &params(), split());

        let jan_2 = schedule
            .frames
            .iter()
            .find(|f| f.date == date(2007, 1, 2))
            .unwrap();
        assert_eq!(jan_2.circles.len(), 2);
        assert!(jan_2.circles[0].radius <= jan_2.circles[1].radius);
    }

    #[test]
    fn empty_input_has_no_frames() {
        let schedule = frame_schedule(&[], &months(), &params(), split());
        assert!(schedule.frames.is_empty());
        assert!(frame_delays(&schedule.dates(), &AnimationConfig::default(), split(), false).is_empty());
        assert!(frame_delays(&schedule.dates(), &AnimationConfig::default(), split(), true).is_empty());
    }

    #[test]
    fn uniform_delays_pause_after_last_before_frame() {
        let dates = [
            date(2010, 12, 4),
            date(2010, 12, 5),
            date(2016, 4, 3),
            date(2016, 4, 4),
        ];
        let delays = frame_delays(&dates, &AnimationConfig::default(), split(), false);
        assert_eq!(delays, [1, 100, 1, 1]);
    }

    #[test]
    fn weighted_delays_fill_runtime() {
        let cfg = AnimationConfig::default();
        let dates = [
            date(2010, 12, 1),
            date(2010, 12, 5),
            date(2016, 5, 1),
            date(2016, 5, 3),
        ];
        let delays = frame_delays(&dates, &cfg, date(2000, 1, 1), true);

        // Gaps 4, 1974 -> 21, 2, then 20 for the last frame: 47 days total.
        let scale = 3000.0 / 47.0;
        let expected: Vec<u32> = [4.0, 21.0, 2.0, 20.0]
            .iter()
            .map(|g: &f64| (g * scale).round() as u32)
            .collect();
        assert_eq!(delays, expected);

        let total: u32 = delays.iter().sum();
        assert!(total.abs_diff(cfg.runtime) <= 4);
    }
}
