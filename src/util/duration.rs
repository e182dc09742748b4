//! Parse durations, ISO-8601 (`PT6H`, `P7D`, `P1DT2H3M4.5S`) and
//! human-friendly (`6h`, `7days`) forms.

use chrono::Duration;

use crate::Result;

const MILLIS_SECOND: i64 = 1_000;
const MILLIS_MINUTE: i64 = 60 * MILLIS_SECOND;
const MILLIS_HOUR: i64 = 60 * MILLIS_MINUTE;
const MILLIS_DAY: i64 = 24 * MILLIS_HOUR;
const MILLIS_WEEK: i64 = 7 * MILLIS_DAY;

/// Parse `text` into a duration. Text starting with `P`, optionally
/// signed, is parsed as ISO-8601 duration, supported designators are
/// W, D in the date part and H, M, S in the time part. Years and months
/// are rejected, their length is not fixed. Any other text is parsed
/// using humantime.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let s = text.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let millis = match rest.strip_prefix('P').or_else(|| rest.strip_prefix('p')) {
        Some(body) => parse_iso8601(text, body)?,
        None if negative => {
            return err_at!(InvalidConfig, msg: "negative duration {:?}", text)
        }
        None => {
            let d = err_at!(InvalidConfig, humantime::parse_duration(s), "{:?}", text)?;
            let d = err_at!(InvalidConfig, Duration::from_std(d), "{:?}", text)?;
            d.num_milliseconds()
        }
    };

    Ok(Duration::milliseconds(if negative { -millis } else { millis }))
}

fn parse_iso8601(text: &str, body: &str) -> Result<i64> {
    let (date, time) = match body.find(|c| c == 'T' || c == 't') {
        Some(off) => (&body[..off], Some(&body[off + 1..])),
        None => (body, None),
    };
    match (date, time) {
        ("", None) | (_, Some("")) => {
            return err_at!(InvalidConfig, msg: "incomplete duration {:?}", text)
        }
        _ => (),
    }

    let mut millis: i64 = 0;
    for (num, unit) in components(text, date)?.into_iter() {
        let factor = match unit {
            'W' => MILLIS_WEEK,
            'D' => MILLIS_DAY,
            _ => return err_at!(InvalidConfig, msg: "bad unit {} in {:?}", unit, text),
        };
        millis = accumulate(text, millis, whole(text, &num)?, factor)?;
    }

    let time = components(text, time.unwrap_or(""))?;
    let n = time.len();
    for (i, (num, unit)) in time.into_iter().enumerate() {
        millis = match unit {
            'H' => accumulate(text, millis, whole(text, &num)?, MILLIS_HOUR)?,
            'M' => accumulate(text, millis, whole(text, &num)?, MILLIS_MINUTE)?,
            'S' if i + 1 == n => {
                let secs = seconds(text, &num)?;
                match millis.checked_add(secs) {
                    Some(millis) => millis,
                    None => return err_at!(InvalidConfig, msg: "overflow {:?}", text),
                }
            }
            _ => return err_at!(InvalidConfig, msg: "bad unit {} in {:?}", unit, text),
        };
    }

    Ok(millis)
}

// split "1D2W" into [("1", 'D'), ("2", 'W')]
fn components(text: &str, part: &str) -> Result<Vec<(String, char)>> {
    let mut items = vec![];
    let mut num = String::default();
    for ch in part.chars() {
        match ch {
            '0'..='9' | '.' | ',' => num.push(if ch == ',' { '.' } else { ch }),
            ch if ch.is_ascii_alphabetic() && !num.is_empty() => {
                items.push((num.clone(), ch.to_ascii_uppercase()));
                num.clear();
            }
            _ => return err_at!(InvalidConfig, msg: "unexpected {:?} in {:?}", ch, text),
        }
    }
    if !num.is_empty() {
        return err_at!(InvalidConfig, msg: "missing unit in {:?}", text);
    }
    Ok(items)
}

fn whole(text: &str, num: &str) -> Result<i64> {
    err_at!(InvalidConfig, num.parse::<i64>(), "in {:?}", text)
}

// seconds, with optional fraction, in milli-seconds.
fn seconds(text: &str, num: &str) -> Result<i64> {
    let (secs, frac) = match num.find('.') {
        Some(off) => (&num[..off], &num[off + 1..]),
        None => (num, ""),
    };
    let secs = if secs.is_empty() { 0 } else { whole(text, secs)? };
    let frac = match frac.len() {
        0 => 0,
        _ if frac.contains('.') => {
            return err_at!(InvalidConfig, msg: "bad fraction in {:?}", text)
        }
        _ => {
            let mut digits: String = frac.chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            whole(text, &digits)?
        }
    };
    accumulate(text, frac, secs, MILLIS_SECOND)
}

fn accumulate(text: &str, acc: i64, num: i64, factor: i64) -> Result<i64> {
    match num.checked_mul(factor).and_then(|n| n.checked_add(acc)) {
        Some(acc) => Ok(acc),
        None => err_at!(InvalidConfig, msg: "overflow {:?}", text),
    }
}

#[cfg(test)]
#[path = "duration_test.rs"]
mod duration_test;
