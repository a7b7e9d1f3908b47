//! Hourly history of a token's routes and supply movements, plus the
//! forward neuron dissolve schedule.

use std::collections::{BTreeMap, HashMap};

use common::time::{Clock, DAY_SECS, HOUR_SECS, last_started_tick};
use corelib::{TokenDay, TokenId};
use market::{At, SeriesPoint};
use num_bigint::BigInt;
use num_traits::Signed;
use tracing::{debug, instrument, warn};

use crate::aggregator::TokenAggregator;
use crate::error::{AggregatorError, optional};
use crate::snapshot::{HistoricalSeries, MergedPoint, NeuronPoint, RoutePoint, RouteSource};
use crate::supply::{parse_whole, to_float};

/// Days covered by the neuron dissolve schedule.
pub const NEURON_SCHEDULE_DAYS: usize = 364;

/// Hourly buckets between two daily volume samples.
const BUCKETS_PER_DAY: usize = 24;

impl<C: Clock> TokenAggregator<C> {
    #[instrument(skip(self), target = "aggregator")]
    pub fn historical_series(
        &self,
        token: TokenId,
        base: TokenId,
        period_hours: i64,
    ) -> Result<HistoricalSeries, AggregatorError> {
        let cfg = self.token_config(token)?.clone();
        self.token_config(base)?;

        let routes = self.routes(token, base);
        if routes.is_empty() {
            return Err(AggregatorError::NoRoute { token, base });
        }

        let now = self.clock().now_secs();
        let tlast = self.last_hour();
        let tstart = tlast - period_hours * HOUR_SECS;

        let token_price = optional(self.resolve_price(token, base, 0))?;
        let volume_price =
            optional(self.resolve_price(self.catalog().volume_token, base, 0))?;

        let series = self.route_series(&routes, tstart, tlast)?;
        let buckets = series.first().map_or(0, Vec::len);

        let mut deltas = DeltaTracker::default();
        let mut held_prices: HashMap<TokenId, Option<f64>> = HashMap::new();
        let mut merged = Vec::with_capacity(buckets);
        let mut unreadable = 0usize;

        for i in 0..buckets {
            let t = tstart + i as i64 * HOUR_SECS;
            let day = self.day_at(token, last_started_tick(DAY_SECS, t))?;

            let mut point = MergedPoint {
                t,
                circulating_delta: None,
                treasury_delta: None,
                other_treasury_deltas: BTreeMap::new(),
                routes: series
                    .iter()
                    .map(|s| route_point(s.get(i), volume_price))
                    .collect(),
            };

            if let Some(day) = &day {
                match self.day_amounts(day, cfg.decimals) {
                    Ok(amounts) => {
                        if amounts.total.is_positive() {
                            point.circulating_delta =
                                priced(&deltas.locked.delta(amounts.locked), token_price);
                        }
                        if let Some(own) = amounts.treasury {
                            point.treasury_delta = priced(&deltas.treasury.delta(own), token_price);
                        }
                        for (held, amount) in amounts.others {
                            let delta = deltas.others.entry(held).or_default().delta(amount);

                            let price = match held_prices.get(&held).copied() {
                                Some(p) => p,
                                None => {
                                    let p = if held == token {
                                        token_price
                                    } else {
                                        optional(self.resolve_price(held, base, 1))?
                                    };
                                    held_prices.insert(held, p);
                                    p
                                }
                            };
                            if let Some(v) = priced(&delta, price) {
                                point.other_treasury_deltas.insert(held, v);
                            }
                        }
                    }
                    Err(e) => {
                        unreadable += 1;
                        debug!(t, error = %e, "daily record unreadable, bucket deltas left empty");
                    }
                }
            }

            merged.push(point);
        }

        if unreadable > 0 {
            warn!(token, unreadable, "history buckets skipped on unreadable daily records");
        }

        let day_now = last_started_tick(DAY_SECS, now);
        let latest_day = match self.day_at(token, day_now)? {
            Some(d) => Some(d),
            None => self.day_at(token, day_now - DAY_SECS)?,
        };
        let neurons = neuron_schedule(latest_day.as_ref(), cfg.decimals, token_price, now)?;

        let sources = routes
            .iter()
            .zip(&series)
            .map(|(route, points)| {
                let dex_id = route
                    .first_pair()
                    .and_then(|p| self.catalog().pair(p))
                    .and_then(|p| p.dex_id())
                    .map(str::to_string);
                let dex = dex_id.as_deref().and_then(|id| self.catalog().dex(id)).cloned();
                route_source(dex_id, dex, points, volume_price)
            })
            .collect();

        debug!(buckets, lines = routes.len(), "historical series computed");

        Ok(HistoricalSeries {
            token: cfg,
            lines: routes.len(),
            merged,
            neurons,
            sources,
        })
    }

    /// Whole-token amounts of one daily record. Any unparsable amount or
    /// unknown treasury token fails the record as a whole.
    fn day_amounts(&self, day: &TokenDay, decimals: u32) -> Result<DayAmounts, AggregatorError> {
        let total = parse_whole(&day.total_supply, decimals)?;
        let Some(l) = &day.locking else {
            return Ok(DayAmounts {
                total,
                locked: BigInt::default(),
                treasury: None,
                others: Vec::new(),
            });
        };

        let mut others = Vec::with_capacity(l.other_treasuries.len());
        for (held, raw) in &l.other_treasuries {
            let held_decimals = self.token_config(*held)?.decimals;
            others.push((*held, parse_whole(raw, held_decimals)?));
        }

        Ok(DayAmounts {
            total,
            locked: parse_whole(&l.total_locked, decimals)?,
            treasury: Some(parse_whole(&l.treasury, decimals)?),
            others,
        })
    }

    /// Daily record for the day starting at `day_start`; a token without a
    /// daily series has no record.
    fn day_at(&self, token: TokenId, day_start: i64) -> Result<Option<TokenDay>, AggregatorError> {
        optional(
            self.resolver()
                .token_day(token, At::Time(day_start))
                .map_err(Into::into),
        )
    }
}

struct DayAmounts {
    total: BigInt,
    locked: BigInt,
    treasury: Option<BigInt>,
    others: Vec<(TokenId, BigInt)>,
}

/// Cumulative change against the first observed value.
#[derive(Debug, Default, Clone)]
struct Baseline(Option<BigInt>);

impl Baseline {
    fn delta(&mut self, value: BigInt) -> BigInt {
        let base = self.0.get_or_insert_with(|| value.clone());
        &value - &*base
    }
}

#[derive(Debug, Default)]
struct DeltaTracker {
    locked: Baseline,
    treasury: Baseline,
    others: HashMap<TokenId, Baseline>,
}

fn priced(delta: &BigInt, price: Option<f64>) -> Option<f64> {
    price.zip(to_float(delta)).map(|(p, d)| d * p)
}

fn route_point(point: Option<&SeriesPoint>, volume_price: Option<f64>) -> Option<RoutePoint> {
    let q = point?.quote?;
    Some(RoutePoint {
        price: q.price,
        volume: volume_price.map(|vp| q.volume24h * vp),
        depth_bid: q.depth_bid,
        depth_ask: q.depth_ask,
    })
}

/// Sum of `volume24h` over `days` samples taken every 24 buckets back from
/// the newest one; `None` if any sample is missing.
fn sampled_volume(points: &[SeriesPoint], days: usize, volume_price: Option<f64>) -> Option<f64> {
    let vp = volume_price?;
    let last = points.len().checked_sub(1)?;
    (0..days)
        .map(|d| {
            let idx = last.checked_sub(d * BUCKETS_PER_DAY)?;
            points[idx].quote.map(|q| q.volume24h * vp)
        })
        .sum()
}

fn route_source(
    dex_id: Option<String>,
    dex: Option<corelib::DexInfo>,
    points: &[SeriesPoint],
    volume_price: Option<f64>,
) -> RouteSource {
    let latest = points.last().and_then(|p| p.quote);
    RouteSource {
        dex_id,
        dex,
        price: latest.map(|q| q.price),
        volume24: latest.zip(volume_price).map(|(q, vp)| q.volume24h * vp),
        volume7: sampled_volume(points, 7, volume_price),
        volume30: sampled_volume(points, 30, volume_price),
        liquidity: latest.map(|q| q.depth_bid),
        liquidity_ask: latest.map(|q| q.depth_ask),
    }
}

/// Cumulative dissolving / not-dissolving value per day, starting today.
fn neuron_schedule(
    day: Option<&TokenDay>,
    decimals: u32,
    price: Option<f64>,
    now: i64,
) -> Result<Vec<NeuronPoint>, AggregatorError> {
    let locking = day.and_then(|d| d.locking.as_ref());
    let mut dissolving = BigInt::default();
    let mut not_dissolving = BigInt::default();

    (0..NEURON_SCHEDULE_DAYS)
        .map(|i| -> Result<NeuronPoint, AggregatorError> {
            let t = now + i as i64 * DAY_SECS;
            let Some(l) = locking else {
                return Ok(NeuronPoint {
                    t,
                    dissolving: None,
                    not_dissolving: None,
                });
            };
            dissolving += schedule_amount(&l.dissolving, i, decimals)?;
            not_dissolving += schedule_amount(&l.not_dissolving, i, decimals)?;
            Ok(NeuronPoint {
                t,
                dissolving: priced(&dissolving, price),
                not_dissolving: priced(&not_dissolving, price),
            })
        })
        .collect()
}

fn schedule_amount(schedule: &[String], day: usize, decimals: u32) -> Result<BigInt, AggregatorError> {
    match schedule.get(day) {
        Some(raw) => parse_whole(raw, decimals),
        None => Ok(BigInt::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market::PathQuote;

    fn points(volumes: &[Option<f64>]) -> Vec<SeriesPoint> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint {
                t: i as i64 * HOUR_SECS,
                quote: v.map(|v| PathQuote {
                    price: 1.0,
                    volume24h: v,
                    depth_bid: 0.0,
                    depth_ask: 0.0,
                }),
            })
            .collect()
    }

    #[test]
    fn baseline_is_first_value() {
        let mut b = Baseline::default();
        assert_eq!(b.delta(BigInt::from(10)), BigInt::from(0));
        assert_eq!(b.delta(BigInt::from(15)), BigInt::from(5));
        assert_eq!(b.delta(BigInt::from(7)), BigInt::from(-3));
    }

    #[test]
    fn baseline_delta_spans_past_i128() {
        let mut b = Baseline::default();
        b.delta(BigInt::from(i128::MAX));
        let d = b.delta(BigInt::from(i128::MIN));
        assert_eq!(d, BigInt::from(i128::MIN) - BigInt::from(i128::MAX));
        assert_eq!(priced(&d, Some(1.0)), Some(-2.0 * i128::MAX as f64));
        assert_eq!(priced(&d, None), None);
    }

    #[test]
    fn volume_samples_every_day_back() {
        let mut vols = vec![Some(1.0); 7 * 24];
        vols[167] = Some(10.0);
        vols[167 - 24] = Some(20.0);
        let pts = points(&vols);

        assert_eq!(sampled_volume(&pts, 7, Some(2.0)), Some((10.0 + 20.0 + 5.0) * 2.0));
        // 30 samples need 29 * 24 + 1 buckets
        assert_eq!(sampled_volume(&pts, 30, Some(2.0)), None);
        assert_eq!(sampled_volume(&pts, 7, None), None);
    }

    #[test]
    fn missing_sample_voids_volume() {
        let mut vols = vec![Some(1.0); 48];
        vols[47 - 24] = None;
        assert_eq!(sampled_volume(&points(&vols), 2, Some(1.0)), None);
        assert_eq!(sampled_volume(&points(&vols), 1, Some(1.0)), Some(1.0));
    }

    #[test]
    fn neuron_schedule_accumulates_and_pads() {
        let day = TokenDay {
            total_supply: "0".into(),
            circulating_supply: None,
            locking: Some(corelib::TokenLocking {
                dissolving: vec!["100".into(), "200".into()],
                not_dissolving: vec!["50".into()],
                ..Default::default()
            }),
        };
        let pts = neuron_schedule(Some(&day), 1, Some(2.0), 1_000).unwrap();
        assert_eq!(pts.len(), NEURON_SCHEDULE_DAYS);
        assert_eq!(pts[0].t, 1_000);
        assert_eq!(pts[1].t, 1_000 + DAY_SECS);
        assert_eq!(pts[0].dissolving, Some(20.0));
        assert_eq!(pts[1].dissolving, Some(60.0));
        assert_eq!(pts[363].dissolving, Some(60.0));
        assert_eq!(pts[0].not_dissolving, Some(10.0));
        assert_eq!(pts[5].not_dissolving, Some(10.0));
    }

    #[test]
    fn neuron_schedule_without_locking_is_unavailable() {
        let pts = neuron_schedule(None, 8, Some(1.0), 0).unwrap();
        assert_eq!(pts.len(), NEURON_SCHEDULE_DAYS);
        assert!(pts.iter().all(|p| p.dissolving.is_none() && p.not_dissolving.is_none()));
    }
}
