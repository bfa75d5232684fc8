use crate::ast::Attribute;
use crate::errors::Error;
use hcl::Expression;

/// Literal string value of an attribute
pub(crate) fn string_literal(attribute: &Attribute) -> Result<String, Error> {
    match &attribute.expr {
        Expression::String(s) => Ok(s.clone()),
        _ => Err(Error::schema(
            attribute.expr_range.clone(),
            format!("attribute {:?} must be a string literal", attribute.name),
        )),
    }
}

/// Literal boolean value of an attribute
pub(crate) fn bool_literal(attribute: &Attribute) -> Result<bool, Error> {
    match &attribute.expr {
        Expression::Bool(b) => Ok(*b),
        _ => Err(Error::schema(
            attribute.expr_range.clone(),
            format!("attribute {:?} must be a boolean literal", attribute.name),
        )),
    }
}

/// Literal list of strings, duplicates are rejected
pub(crate) fn string_list_literal(attribute: &Attribute) -> Result<Vec<String>, Error> {
    let not_a_list = || {
        Error::schema(
            attribute.expr_range.clone(),
            format!("attribute {:?} must be a list of string literals", attribute.name),
        )
    };

    let Expression::Array(elements) = &attribute.expr else {
        return Err(not_a_list());
    };

    let mut values: Vec<String> = Vec::with_capacity(elements.len());
    for element in elements {
        let Expression::String(value) = element else {
            return Err(not_a_list());
        };

        if values.contains(value) {
            return Err(Error::schema(
                attribute.expr_range.clone(),
                format!("duplicated entry {value:?} in attribute {:?}", attribute.name),
            ));
        }
        values.push(value.clone());
    }

    Ok(values)
}

/// Levenshtein distance, used for "did you mean" hints
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }

    previous[b.len()]
}

/// Joins names as `"a", "b" or "c"`
pub(crate) fn quoted_choice(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| format!("{name:?}")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {last}", init.join(", ")),
    }
}
