//! Built-in `courier:` function library.

use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use uuid::Uuid;

use crate::error::{CourierError, Result};
use crate::functions::FunctionLibrary;
use crate::runtime::TestContext;

/// Prefix of the default function library.
pub const DEFAULT_PREFIX: &str = "courier:";

/// Build the default function library.
pub fn default_function_library() -> FunctionLibrary {
    FunctionLibrary::new("courier-functions", DEFAULT_PREFIX)
        .with_function("concat", concat)
        .with_function("upperCase", upper_case)
        .with_function("lowerCase", lower_case)
        .with_function("substring", substring)
        .with_function("stringLength", string_length)
        .with_function("translate", translate)
        .with_function("randomNumber", random_number)
        .with_function("randomString", random_string)
        .with_function("randomUUID", random_uuid)
        .with_function("currentDate", current_date)
        .with_function("sum", sum)
        .with_function("max", max)
        .with_function("min", min)
        .with_function("absolute", absolute)
        .with_function("round", round)
        .with_function("escapeXml", escape_xml)
}

fn expect_args<'a>(function: &str, args: &'a [String], min: usize, max: usize) -> Result<&'a [String]> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(CourierError::invalid_args(
            function,
            format!("expected {} arguments, got {}", expected, args.len()),
        ));
    }
    Ok(args)
}

fn parse_number(function: &str, arg: &str) -> Result<f64> {
    arg.trim()
        .parse::<f64>()
        .map_err(|_| CourierError::invalid_args(function, format!("'{}' is not a number", arg)))
}

fn parse_index(function: &str, arg: &str) -> Result<usize> {
    arg.trim()
        .parse::<usize>()
        .map_err(|_| CourierError::invalid_args(function, format!("'{}' is not a valid index", arg)))
}

/// Integral values print without a fraction so `sum('1', '2')` yields `3`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn concat(args: &[String], _context: &TestContext) -> Result<String> {
    Ok(args.concat())
}

fn upper_case(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("upperCase", args, 1, 1)?;
    Ok(args[0].to_uppercase())
}

fn lower_case(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("lowerCase", args, 1, 1)?;
    Ok(args[0].to_lowercase())
}

fn substring(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("substring", args, 2, 3)?;
    let chars: Vec<char> = args[0].chars().collect();
    let begin = parse_index("substring", &args[1])?;
    let end = match args.get(2) {
        Some(end) => parse_index("substring", end)?,
        None => chars.len(),
    };

    if begin > end || end > chars.len() {
        return Err(CourierError::invalid_args(
            "substring",
            format!("range {}..{} out of bounds for length {}", begin, end, chars.len()),
        ));
    }

    Ok(chars[begin..end].iter().collect())
}

fn string_length(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("stringLength", args, 1, 1)?;
    Ok(args[0].chars().count().to_string())
}

fn translate(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("translate", args, 3, 3)?;
    let pattern = Regex::new(&args[1])
        .map_err(|e| CourierError::invalid_args("translate", format!("invalid pattern: {}", e)))?;
    Ok(pattern.replace_all(&args[0], args[2].as_str()).into_owned())
}

fn random_number(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("randomNumber", args, 1, 2)?;
    let length = parse_index("randomNumber", &args[0])?;
    let padding = args.get(1).map(|p| p.eq_ignore_ascii_case("true")).unwrap_or(false);

    let mut rng = rand::thread_rng();
    let mut digits = String::with_capacity(length);
    for idx in 0..length {
        let digit = if idx == 0 && !padding && length > 1 {
            rng.gen_range(1..=9)
        } else {
            rng.gen_range(0..=9)
        };
        digits.push(char::from(b'0' + digit));
    }
    Ok(digits)
}

fn random_string(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("randomString", args, 1, 3)?;
    let length = parse_index("randomString", &args[0])?;
    let mode = args.get(1).map(|m| m.to_uppercase()).unwrap_or_else(|| "MIXED".to_string());
    let with_numbers = args.get(2).map(|n| n.eq_ignore_ascii_case("true")).unwrap_or(false);

    let mut rng = rand::thread_rng();
    let mut result = String::with_capacity(length);
    while result.chars().count() < length {
        let c = char::from(rng.sample(Alphanumeric));
        if c.is_ascii_digit() && !with_numbers {
            continue;
        }
        let c = match mode.as_str() {
            "UPPERCASE" => c.to_ascii_uppercase(),
            "LOWERCASE" => c.to_ascii_lowercase(),
            "MIXED" => c,
            other => {
                return Err(CourierError::invalid_args(
                    "randomString",
                    format!("unknown mode '{}'", other),
                ))
            }
        };
        result.push(c);
    }
    Ok(result)
}

fn random_uuid(args: &[String], _context: &TestContext) -> Result<String> {
    expect_args("randomUUID", args, 0, 0)?;
    Ok(Uuid::new_v4().to_string())
}

fn current_date(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("currentDate", args, 0, 1)?;
    let format = args.first().map(String::as_str).unwrap_or("%d.%m.%Y");
    let mut rendered = String::new();
    use std::fmt::Write;
    write!(rendered, "{}", Local::now().format(format))
        .map_err(|_| CourierError::invalid_args("currentDate", format!("invalid format '{}'", format)))?;
    Ok(rendered)
}

fn sum(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("sum", args, 1, usize::MAX)?;
    let total = args
        .iter()
        .map(|arg| parse_number("sum", arg))
        .sum::<Result<f64>>()?;
    Ok(format_number(total))
}

fn max(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("max", args, 1, usize::MAX)?;
    let mut best = f64::MIN;
    for arg in args {
        best = best.max(parse_number("max", arg)?);
    }
    Ok(format_number(best))
}

fn min(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("min", args, 1, usize::MAX)?;
    let mut best = f64::MAX;
    for arg in args {
        best = best.min(parse_number("min", arg)?);
    }
    Ok(format_number(best))
}

fn absolute(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("absolute", args, 1, 1)?;
    Ok(format_number(parse_number("absolute", &args[0])?.abs()))
}

fn round(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("round", args, 1, 1)?;
    Ok(format_number(parse_number("round", &args[0])?.round()))
}

fn escape_xml(args: &[String], _context: &TestContext) -> Result<String> {
    let args = expect_args("escapeXml", args, 1, 1)?;
    let mut escaped = String::with_capacity(args[0].len());
    for c in args[0].chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Ok(escaped)
}
