use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  NaiveDateTime,
  TimeDelta,
  Utc,
  Weekday
};
use regex::Regex;

/// Parses a due-date expression.
///
/// Calendar words and bare dates resolve
/// to midnight UTC.
pub fn parse_due(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = now.date_naive();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return utc_midnight(today);
    }
    | "tomorrow" => {
      return utc_midnight(
        today.succ_opt().ok_or_else(
          || anyhow!("no day after {today}")
        )?
      );
    }
    | "yesterday" => {
      return utc_midnight(
        today.pred_opt().ok_or_else(
          || anyhow!("no day before {today}")
        )?
      );
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return utc_midnight(
      next_weekday_date(today, target)
    );
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let out_of_range = || {
      anyhow!(
        "unrecognized date expression: \
         {input} (offset out of range)"
      )
    };
    let num: i64 = caps["num"]
      .parse()
      .map_err(|_| out_of_range())?;
    let duration = match &caps["unit"]
    {
      | "d" => TimeDelta::try_days(num),
      | "h" => TimeDelta::try_hours(num),
      | _ => TimeDelta::try_minutes(num)
    }
    .ok_or_else(out_of_range)?;

    let due = if &caps["sign"] == "-" {
      now.checked_sub_signed(duration)
    } else {
      now.checked_add_signed(duration)
    };
    return due.ok_or_else(out_of_range);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return utc_midnight(date);
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(ndt.and_utc());
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     +Nd/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DD HH:MM"
  })
}

pub fn format_due(
  value: DateTime<Utc>
) -> String {
  value.format("%Y-%m-%d").to_string()
}

fn utc_midnight(
  date: NaiveDate
) -> anyhow::Result<DateTime<Utc>> {
  date
    .and_hms_opt(0, 0, 0)
    .map(|ndt| ndt.and_utc())
    .ok_or_else(|| {
      anyhow!(
        "failed to construct midnight \
         for {date}"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Strictly after `from`; the same
/// weekday means one week later.
fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = i64::from(
    from.weekday().num_days_from_monday()
  );
  let target_idx = i64::from(
    target.num_days_from_monday()
  );
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(TimeDelta::days(
      delta
    ))
    .unwrap_or(from)
}
