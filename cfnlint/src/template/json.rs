use jsonc_parser::ParseOptions;
use jsonc_parser::ast::Value;
use jsonc_parser::common::Ranged;

use crate::template::node::{Key, Node, Number, Origin, Scalar};
use crate::template::source::{LineIndex, ParseError, depth_exceeded};

/// Parse a JSON template into the value tree.
///
/// Comments and trailing commas are tolerated, other JSON5 extensions are not.
pub(crate) fn parse(text: &str, max_depth: usize) -> Result<Node, ParseError> {
	let parse_options = ParseOptions {
		allow_comments: true,
		allow_trailing_commas: true,
		allow_loose_object_property_names: false,
		allow_missing_commas: false,
		allow_single_quoted_strings: false,
		allow_hexadecimal_numbers: false,
		allow_unary_plus_numbers: false,
		allow_bare_decimal_point_numbers: false,
		allow_non_finite_numbers: false,
		allow_extended_string_escapes: false,
	};

	let index = LineIndex::new(text);

	let parse_result = jsonc_parser::parse_to_ast(text, &Default::default(), &parse_options)
		.map_err(|err| {
			ParseError::new(index.origin(err.range().start), format!("JSON parse error: {err}"))
		})?;

	let root = parse_result
		.value
		.ok_or_else(|| ParseError::new(Origin::default(), "template is empty"))?;

	let converter = JsonConverter {
		index: &index,
		max_depth,
	};
	converter.convert(&root, 0)
}

struct JsonConverter<'i, 'a> {
	index: &'i LineIndex<'a>,
	max_depth: usize,
}

impl JsonConverter<'_, '_> {
	fn origin<T: Ranged>(&self, item: &T) -> Origin {
		self.index.origin(item.range().start)
	}

	fn convert(&self, value: &Value<'_>, depth: usize) -> Result<Node, ParseError> {
		let origin = self.origin(value);
		if depth > self.max_depth {
			return Err(depth_exceeded(origin, self.max_depth));
		}

		if let Some(s) = value.as_string_lit() {
			return Ok(Node::string(s.value.to_string(), origin));
		}

		if let Some(n) = value.as_number_lit() {
			return number(n.value, origin).map(|n| Node::scalar(Scalar::Number(n), origin));
		}

		if let Some(b) = value.as_boolean_lit() {
			return Ok(Node::scalar(Scalar::Bool(b.value), origin));
		}

		if let Some(array) = value.as_array() {
			let items = array
				.elements
				.iter()
				.map(|element| self.convert(element, depth + 1))
				.collect::<Result<Vec<_>, _>>()?;
			return Ok(Node::sequence(items, origin));
		}

		if let Some(object) = value.as_object() {
			let mut entries = Vec::with_capacity(object.properties.len());
			for prop in &object.properties {
				let key = Key::new(prop.name.as_str(), self.origin(&prop.name));
				entries.push((key, self.convert(&prop.value, depth + 1)?));
			}
			return Ok(Node::mapping(entries, origin));
		}

		// only the null keyword is left
		Ok(Node::scalar(Scalar::Null, origin))
	}
}

fn number(raw: &str, origin: Origin) -> Result<Number, ParseError> {
	if let Ok(i) = raw.parse::<i64>() {
		return Ok(Number::Integer(i));
	}
	raw.parse::<f64>()
		.map(Number::Float)
		.map_err(|_| ParseError::new(origin, format!("invalid number literal `{raw}`")))
}
