//! Built-in function registration.

use crate::catalog::Catalog;
use crate::error::{Error, Result};

use super::{AggregateFunction, DatePart, Expression};

/// Register the built-in aggregates and date-part functions.
///
/// Fails if any of the names is already registered.
pub fn register_defaults(catalog: &Catalog) -> Result<()> {
    for function in AggregateFunction::ALL {
        catalog.register_function(function.name(), move |args| {
            let child = unary(function.name(), args)?;
            if function != AggregateFunction::Count {
                reject_star(function.name(), &child)?;
            }
            Ok(Expression::aggregate(function, child))
        })?;
    }

    for part in DatePart::ALL {
        catalog.register_function(part.name(), move |args| {
            let child = unary(part.name(), args)?;
            reject_star(part.name(), &child)?;
            Ok(Expression::date_part(part, child))
        })?;
    }

    Ok(())
}

fn unary(function: &str, mut args: Vec<Expression>) -> Result<Expression> {
    if args.len() != 1 {
        return Err(Error::InvalidArguments {
            function: function.to_string(),
            reason: format!("expected 1 argument, got {}", args.len()),
        });
    }
    Ok(args.remove(0))
}

fn reject_star(function: &str, arg: &Expression) -> Result<()> {
    if *arg == Expression::Star {
        return Err(Error::InvalidArguments {
            function: function.to_string(),
            reason: "* is only valid in count(*)".to_string(),
        });
    }
    Ok(())
}
