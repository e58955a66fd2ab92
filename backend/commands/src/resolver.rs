//! Argument resolver: raw wire values to typed, validated arguments.
//!
//! Per option, in declaration order: type coercion, choice membership,
//! bounds, channel type, directory lookup. The first violation wins.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;
use slashforge_core::{
    ChannelType, ChoiceValue, CommandError, Entity, EntityKind, PlatformDirectory, RawOption, Snowflake,
};
use tracing::debug;

use crate::arguments::BoundArguments;
use crate::node::LeafCommand;
use crate::option::{OptionSchema, OptionType};
use crate::value::{EntityRef, OptionValue};

/// A coerced value before directory lookup.
enum Coerced {
    Value(OptionValue),
    Entity { id: Snowflake, channel_type: Option<ChannelType> },
}

pub async fn bind(
    leaf: &LeafCommand,
    raw: &[RawOption],
    directory: &dyn PlatformDirectory,
) -> Result<BoundArguments, CommandError> {
    let mut given = HashSet::new();
    for option in raw {
        if leaf.option(&option.name).is_none() {
            return Err(CommandError::invalid_argument(&option.name, "unknown option"));
        }
        if !given.insert(option.name.as_str()) {
            return Err(CommandError::invalid_argument(&option.name, "given more than once"));
        }
    }

    let mut args = BoundArguments::new();
    for schema in leaf.options() {
        let param = leaf.param_for(&schema.name).to_string();
        let supplied = raw
            .iter()
            .find(|o| o.name == schema.name)
            .filter(|o| !o.value.is_null());

        let Some(supplied) = supplied else {
            if schema.required {
                return Err(CommandError::invalid_argument(&schema.name, "required option is missing"));
            }
            if let Some(default) = &schema.default {
                args.push(param, schema.name.clone(), default.clone());
            }
            continue;
        };

        let value = bind_one(schema, &supplied.value, directory).await?;
        args.push(param, schema.name.clone(), value);
    }

    debug!(bound = args.len(), "[Commands] Arguments bound");
    Ok(args)
}

async fn bind_one(
    schema: &OptionSchema,
    raw: &Value,
    directory: &dyn PlatformDirectory,
) -> Result<OptionValue, CommandError> {
    let invalid = |reason: String| CommandError::invalid_argument(&schema.name, reason);

    match coerce(schema.kind, raw).map_err(invalid)? {
        Coerced::Value(value) => {
            check_choices(schema, &value).map_err(invalid)?;
            check_bounds(schema, &value).map_err(invalid)?;
            Ok(value)
        }
        Coerced::Entity { id, channel_type } => {
            if let Some(kind) = channel_type {
                check_channel_type(schema, kind).map_err(invalid)?;
            }
            let expected = match schema.kind.entity_kind() {
                Some(kind) => kind,
                None => return Err(invalid(format!("{} is not an entity type", schema.kind))),
            };
            let entity = lookup(schema, id, expected, directory).await?;
            if let Entity::Channel(channel) = &entity {
                check_channel_type(schema, channel.kind).map_err(invalid)?;
            }
            Ok(OptionValue::Entity(into_ref(schema.kind, entity)))
        }
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

fn coerce(kind: OptionType, raw: &Value) -> Result<Coerced, String> {
    let value = match kind {
        OptionType::String => match raw {
            Value::String(s) => OptionValue::String(s.clone()),
            other => return Err(format!("expected a string, got {}", json_type(other))),
        },
        OptionType::Integer => OptionValue::Integer(coerce_integer(raw)?),
        OptionType::Number => OptionValue::Number(coerce_number(raw)?),
        OptionType::Boolean => match raw {
            Value::Bool(b) => OptionValue::Boolean(*b),
            Value::String(s) if s == "true" => OptionValue::Boolean(true),
            Value::String(s) if s == "false" => OptionValue::Boolean(false),
            other => return Err(format!("expected a boolean, got {}", json_type(other))),
        },
        OptionType::User
        | OptionType::Channel
        | OptionType::Role
        | OptionType::Mentionable
        | OptionType::Attachment => return coerce_entity(kind, raw),
    };
    Ok(Coerced::Value(value))
}

fn coerce_integer(raw: &Value) -> Result<i64, String> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Ok(f as i64),
                _ => Err(format!("expected an integer, got {n}")),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| format!("'{s}' is not an integer")),
        other => Err(format!("expected an integer, got {}", json_type(other))),
    }
}

fn coerce_number(raw: &Value) -> Result<f64, String> {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => return Err(format!("expected a number, got {}", json_type(other))),
    };
    match n {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(format!("'{raw}' is not a finite number")),
    }
}

/// Entity options carry an id, either bare or as `{ "id": .., "type": .. }`
/// where `type` is a channel type hint.
fn coerce_entity(kind: OptionType, raw: &Value) -> Result<Coerced, String> {
    let (id, type_hint) = match raw {
        Value::Object(map) => (map.get("id").and_then(Snowflake::from_json), map.get("type")),
        other => (Snowflake::from_json(other), None),
    };
    let id = id.ok_or_else(|| format!("'{raw}' is not a valid {kind} id"))?;
    let channel_type = match type_hint {
        Some(hint) if kind == OptionType::Channel => {
            let code = hint.as_u64().ok_or_else(|| format!("'{hint}' is not a channel type"))?;
            Some(ChannelType::from_code(code).ok_or_else(|| format!("unknown channel type {code}"))?)
        }
        _ => None,
    };
    Ok(Coerced::Entity { id, channel_type })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

fn check_choices(schema: &OptionSchema, value: &OptionValue) -> Result<(), String> {
    if schema.choices.is_empty() {
        return Ok(());
    }
    let matches = |choice: &ChoiceValue| match (choice, value) {
        (ChoiceValue::String(c), OptionValue::String(v)) => c == v,
        (ChoiceValue::Integer(c), OptionValue::Integer(v)) => c == v,
        (ChoiceValue::Integer(c), OptionValue::Number(v)) => (*c as f64) == *v,
        (ChoiceValue::Number(c), OptionValue::Number(v)) => c == v,
        (ChoiceValue::Number(c), OptionValue::Integer(v)) => *c == (*v as f64),
        _ => false,
    };
    if schema.choices.iter().any(|c| matches(&c.value)) {
        Ok(())
    } else {
        let allowed: Vec<String> = schema.choices.iter().map(|c| c.value.to_string()).collect();
        Err(format!("must be one of {}", allowed.join(", ")))
    }
}

/// Inclusive on both ends. String length counts characters.
fn check_bounds(schema: &OptionSchema, value: &OptionValue) -> Result<(), String> {
    match value {
        OptionValue::Integer(_) | OptionValue::Number(_) => {
            if let Some(min) = schema.min_value {
                if min.compare(value) == Some(Ordering::Less) {
                    return Err(format!("must be at least {min}"));
                }
            }
            if let Some(max) = schema.max_value {
                if max.compare(value) == Some(Ordering::Greater) {
                    return Err(format!("must be at most {max}"));
                }
            }
        }
        OptionValue::String(s) => {
            let len = s.chars().count();
            if let Some(min) = schema.min_length {
                if len < min {
                    return Err(format!("must be at least {min} characters"));
                }
            }
            if let Some(max) = schema.max_length {
                if len > max {
                    return Err(format!("must be at most {max} characters"));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_channel_type(schema: &OptionSchema, kind: ChannelType) -> Result<(), String> {
    if schema.channel_types.is_empty() || schema.channel_types.contains(&kind) {
        Ok(())
    } else {
        Err(format!("channel type {kind:?} is not allowed here"))
    }
}

// ---------------------------------------------------------------------------
// Directory lookup
// ---------------------------------------------------------------------------

async fn lookup(
    schema: &OptionSchema,
    id: Snowflake,
    expected: EntityKind,
    directory: &dyn PlatformDirectory,
) -> Result<Entity, CommandError> {
    let failure = |reason: String| CommandError::EntityResolution {
        option: schema.name.clone(),
        id,
        kind: expected,
        reason,
    };
    match directory.resolve_entity(id, expected).await {
        Ok(Some(entity)) if entity.satisfies(expected) => Ok(entity),
        Ok(Some(entity)) => Err(failure(format!("directory returned a {}", entity.kind()))),
        Ok(None) => Err(failure("not found".to_string())),
        Err(err) => Err(failure(err.to_string())),
    }
}

fn into_ref(kind: OptionType, entity: Entity) -> EntityRef {
    match (kind, entity) {
        (OptionType::Mentionable, entity) => EntityRef::Mentionable(entity),
        (_, Entity::User(user)) => EntityRef::User(user),
        (_, Entity::Channel(channel)) => EntityRef::Channel(channel),
        (_, Entity::Role(role)) => EntityRef::Role(role),
        (_, Entity::Attachment(attachment)) => EntityRef::Attachment(attachment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slashforge_core::{Channel, Permissions, Role, User};

    use crate::builder::CommandBuilder;
    use crate::node::CommandNode;
    use crate::testing::InMemoryDirectory;

    fn node(options: Vec<OptionSchema>) -> CommandNode {
        let mut builder = CommandBuilder::new("cmd", "Test command").handler(|_| async { Ok(()) });
        for option in options {
            builder = builder.option(option);
        }
        builder.build().unwrap()
    }

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::new()
            .with(Entity::User(User { id: Snowflake(10), name: "ana".into(), bot: false }))
            .with(Entity::Role(Role { id: Snowflake(20), name: "mods".into(), permissions: Permissions::NONE }))
            .with(Entity::Channel(Channel { id: Snowflake(30), name: "general".into(), kind: ChannelType::Text }))
            .with(Entity::Channel(Channel { id: Snowflake(31), name: "lounge".into(), kind: ChannelType::Voice }))
    }

    async fn bind_raw(node: &CommandNode, raw: Vec<RawOption>) -> Result<BoundArguments, CommandError> {
        bind(node.as_leaf().unwrap(), &raw, &directory()).await
    }

    fn assert_invalid(result: Result<BoundArguments, CommandError>, expected_option: &str) -> String {
        match result {
            Err(CommandError::ArgumentValidation { option, reason }) => {
                assert_eq!(option, expected_option);
                reason
            }
            other => panic!("expected ArgumentValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn integer_bounds_are_inclusive() {
        let node = node(vec![OptionSchema::integer("n", "Count").required().min_value(1).max_value(10)]);
        for ok in [1, 5, 10] {
            let args = bind_raw(&node, vec![RawOption::new("n", json!(ok))]).await.unwrap();
            assert_eq!(args.get::<i64>("n"), Some(ok));
        }
        for bad in [0, 11] {
            assert_invalid(bind_raw(&node, vec![RawOption::new("n", json!(bad))]).await, "n");
        }
    }

    #[tokio::test]
    async fn large_integer_bounds_compare_exactly() {
        let max = 1i64 << 53;
        let node = node(vec![OptionSchema::integer("n", "Count").required().min_value(-max).max_value(max)]);
        let args = bind_raw(&node, vec![RawOption::new("n", json!(max))]).await.unwrap();
        assert_eq!(args.get::<i64>("n"), Some(max));

        let reason = assert_invalid(bind_raw(&node, vec![RawOption::new("n", json!(max + 1))]).await, "n");
        assert_eq!(reason, format!("must be at most {max}"));
        let reason = assert_invalid(bind_raw(&node, vec![RawOption::new("n", json!(-max - 1))]).await, "n");
        assert_eq!(reason, format!("must be at least {}", -max));
    }

    #[tokio::test]
    async fn number_bounds_are_inclusive() {
        let node = node(vec![OptionSchema::number("x", "Ratio").required().min_value(0.5).max_value(1.5)]);
        assert!(bind_raw(&node, vec![RawOption::new("x", json!(0.5))]).await.is_ok());
        assert!(bind_raw(&node, vec![RawOption::new("x", json!(1.5))]).await.is_ok());
        assert!(bind_raw(&node, vec![RawOption::new("x", json!(1))]).await.is_ok());
        assert_invalid(bind_raw(&node, vec![RawOption::new("x", json!(1.51))]).await, "x");
    }

    #[tokio::test]
    async fn string_length_counts_characters() {
        let node = node(vec![OptionSchema::string("s", "Text").required().min_length(2).max_length(4)]);
        for ok in ["ab", "abcd", "éé", "日本語!"] {
            assert!(bind_raw(&node, vec![RawOption::new("s", json!(ok))]).await.is_ok(), "{ok}");
        }
        for bad in ["a", "abcde"] {
            assert_invalid(bind_raw(&node, vec![RawOption::new("s", json!(bad))]).await, "s");
        }
    }

    #[tokio::test]
    async fn integer_choices_restrict_input() {
        let node = node(vec![
            OptionSchema::integer("integer_option", "Pick")
                .required()
                .choice("One", 1i64)
                .choice("Two", 2i64),
        ]);
        let reason = assert_invalid(
            bind_raw(&node, vec![RawOption::new("integer_option", json!(3))]).await,
            "integer_option",
        );
        assert!(reason.contains("one of 1, 2"));

        let args = bind_raw(&node, vec![RawOption::new("integer_option", json!(1))]).await.unwrap();
        assert_eq!(args.value("integer_option"), Some(&OptionValue::Integer(1)));
    }

    #[tokio::test]
    async fn coercion_runs_before_choices() {
        let node = node(vec![OptionSchema::integer("n", "Pick").required().choice("One", 1i64)]);
        let reason = assert_invalid(bind_raw(&node, vec![RawOption::new("n", json!("one"))]).await, "n");
        assert!(reason.contains("not an integer"));
        assert!(bind_raw(&node, vec![RawOption::new("n", json!("1"))]).await.is_ok());
    }

    #[tokio::test]
    async fn missing_required_and_unknown_options_rejected() {
        let node = node(vec![OptionSchema::string("name", "Name").required()]);
        assert_invalid(bind_raw(&node, vec![]).await, "name");
        assert_invalid(bind_raw(&node, vec![RawOption::new("name", Value::Null)]).await, "name");
        assert_invalid(
            bind_raw(&node, vec![RawOption::new("name", json!("a")), RawOption::new("extra", json!(1))]).await,
            "extra",
        );
        assert_invalid(
            bind_raw(&node, vec![RawOption::new("name", json!("a")), RawOption::new("name", json!("b"))]).await,
            "name",
        );
    }

    #[tokio::test]
    async fn optional_options_use_default_or_are_omitted() {
        let node = node(vec![
            OptionSchema::integer("a", "A").default_value(7i64),
            OptionSchema::boolean("b", "B"),
        ]);
        let args = bind_raw(&node, vec![]).await.unwrap();
        assert_eq!(args.get::<i64>("a"), Some(7));
        assert!(!args.contains("b"));
        assert_eq!(args.len(), 1);
    }

    #[tokio::test]
    async fn bound_order_follows_declaration() {
        let node = node(vec![
            OptionSchema::string("first", "First").required(),
            OptionSchema::integer("second", "Second").required(),
            OptionSchema::boolean("third", "Third"),
        ]);
        let args = bind_raw(
            &node,
            vec![
                RawOption::new("third", json!(true)),
                RawOption::new("second", json!(2)),
                RawOption::new("first", json!("x")),
            ],
        )
        .await
        .unwrap();
        let order: Vec<&str> = args.iter().map(|a| a.option.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn entities_resolve_through_directory() {
        let node = node(vec![
            OptionSchema::user("who", "Member").required(),
            OptionSchema::mentionable("target", "Anyone").required(),
        ]);
        let args = bind_raw(
            &node,
            vec![RawOption::new("who", json!("10")), RawOption::new("target", json!(20))],
        )
        .await
        .unwrap();
        assert_eq!(args.get::<User>("who").map(|u| u.name), Some("ana".to_string()));
        assert_eq!(args.get::<Role>("target").map(|r| r.name), Some("mods".to_string()));
    }

    #[tokio::test]
    async fn missing_or_mistyped_entities_are_resolution_errors() {
        let node = node(vec![OptionSchema::user("who", "Member").required()]);
        let err = bind_raw(&node, vec![RawOption::new("who", json!("99"))]).await.unwrap_err();
        assert!(matches!(err, CommandError::EntityResolution { ref reason, .. } if reason == "not found"));

        let err = bind_raw(&node, vec![RawOption::new("who", json!("20"))]).await.unwrap_err();
        assert!(matches!(err, CommandError::EntityResolution { kind: EntityKind::User, .. }));

        let err = bind_raw(&node, vec![RawOption::new("who", json!("ana"))]).await.unwrap_err();
        assert!(matches!(err, CommandError::ArgumentValidation { .. }));
    }

    #[tokio::test]
    async fn channel_types_checked_before_and_after_lookup() {
        let node = node(vec![
            OptionSchema::channel("where", "Channel")
                .required()
                .channel_types([ChannelType::Text]),
        ]);
        assert!(bind_raw(&node, vec![RawOption::new("where", json!("30"))]).await.is_ok());

        // Voice channel resolved from the directory.
        assert_invalid(bind_raw(&node, vec![RawOption::new("where", json!("31"))]).await, "where");

        // A type hint fails before the lookup, even for an unknown id.
        assert_invalid(
            bind_raw(&node, vec![RawOption::new("where", json!({"id": "999", "type": 2}))]).await,
            "where",
        );
    }
}
