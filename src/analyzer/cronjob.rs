use anyhow::{Result, anyhow, bail};
use k8s_openapi::api::batch::v1::CronJob;
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let cronjobs = client.list_cronjobs(namespace).await?;
  Ok(check(&cronjobs))
}

pub fn check(cronjobs: &[CronJob]) -> Vec<AnalysisResult> {
  cronjobs
    .iter()
    .filter_map(|cronjob| {
      let name = cronjob.name_any();
      let namespace = cronjob.namespace().unwrap_or_default();
      let sensitive = [namespace.clone(), name.clone()];
      let spec = cronjob.spec.as_ref()?;

      let mut failures = Vec::new();

      if spec.suspend == Some(true) {
        failures.push(Failure::new(format!("CronJob {name} is suspended"), &sensitive));
      } else {
        if let Err(e) = validate_schedule(&spec.schedule) {
          failures.push(Failure::new(
            format!("CronJob {name} has an invalid schedule: {e}"),
            &sensitive,
          ));
        }

        if spec.starting_deadline_seconds.is_some_and(|d| d < 0) {
          failures.push(Failure::new(
            format!("CronJob {name} has a negative starting deadline"),
            &sensitive,
          ));
        }
      }

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::namespaced(Filter::CronJob, &namespace, &name, failures);
      result.parent_object = format!("CronJob/{name}");
      Some(result)
    })
    .collect()
}

const MACROS: &[&str] = &["@yearly", "@annually", "@monthly", "@weekly", "@daily", "@midnight", "@hourly"];
const MONTHS: &[&str] = &["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"];
const WEEKDAYS: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

struct Field {
  name: &'static str,
  min: u32,
  max: u32,
  /// Names accepted in place of numbers, starting at `min`
  names: &'static [&'static str],
}

const FIELDS: [Field; 5] = [
  Field {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
  },
  Field {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
  },
  Field {
    name: "day of month",
    min: 1,
    max: 31,
    names: &[],
  },
  Field {
    name: "month",
    min: 1,
    max: 12,
    names: MONTHS,
  },
  Field {
    name: "day of week",
    min: 0,
    // 7 is accepted as an alias for Sunday
    max: 7,
    names: WEEKDAYS,
  },
];

/// Validate a standard 5-field cron expression as accepted by the CronJob controller
pub fn validate_schedule(schedule: &str) -> Result<()> {
  let mut schedule = schedule.trim();
  for prefix in ["CRON_TZ=", "TZ="] {
    if let Some(rest) = schedule.strip_prefix(prefix) {
      match rest.split_once(char::is_whitespace) {
        Some((_, rest)) => schedule = rest.trim_start(),
        None => bail!("missing schedule after timezone"),
      }
    }
  }

  if schedule.is_empty() {
    bail!("empty spec string");
  }

  if let Some(interval) = schedule.strip_prefix("@every ") {
    return validate_interval(interval.trim());
  }
  if schedule.starts_with('@') {
    if MACROS.contains(&schedule) {
      return Ok(());
    }
    bail!("unrecognized descriptor: {schedule}");
  }

  let parts: Vec<&str> = schedule.split_whitespace().collect();
  if parts.len() != FIELDS.len() {
    bail!("expected exactly 5 fields, found {}: {schedule}", parts.len());
  }

  for (part, field) in parts.iter().zip(FIELDS.iter()) {
    validate_field(part, field)?;
  }

  Ok(())
}

fn validate_field(expr: &str, field: &Field) -> Result<()> {
  for item in expr.split(',') {
    let (range, step) = match item.split_once('/') {
      Some((range, step)) => (range, Some(step)),
      None => (item, None),
    };

    if let Some(step) = step {
      match step.parse::<u32>() {
        Ok(0) | Err(_) => bail!("invalid step '{step}' in {} field", field.name),
        Ok(_) => {}
      }
    }

    if range == "*" || range == "?" {
      continue;
    }

    let (start, end) = match range.split_once('-') {
      Some((start, end)) => (value(start, field)?, Some(value(end, field)?)),
      None => (value(range, field)?, None),
    };

    if let Some(end) = end
      && start > end
    {
      bail!("beginning of range ({start}) beyond end of range ({end}) in {} field", field.name);
    }
  }

  Ok(())
}

fn value(token: &str, field: &Field) -> Result<u32> {
  if let Some(index) = field.names.iter().position(|n| n.eq_ignore_ascii_case(token)) {
    return Ok(field.min + index as u32);
  }

  let Ok(value) = token.parse::<u32>() else {
    bail!("failed to parse '{token}' in {} field", field.name);
  };
  if value < field.min || value > field.max {
    bail!(
      "value {value} out of range [{}, {}] in {} field",
      field.min,
      field.max,
      field.name
    );
  }

  Ok(value)
}

/// Validate an `@every` duration such as `90s`, `5m` or `1h30m`
fn validate_interval(interval: &str) -> Result<()> {
  if interval.is_empty() {
    bail!("missing duration for @every");
  }

  let duration = humantime::parse_duration(interval).map_err(|e| anyhow!("invalid duration '{interval}': {e}"))?;
  if duration.is_zero() {
    bail!("duration '{interval}' must be positive");
  }
  Ok(())
}
