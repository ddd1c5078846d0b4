//! QuestionTree Compiler
//!
//! Turns a nested JSON form definition (`{pages: [{elements: [...]}]}`) into a
//! flat arena of question nodes, then persists the arena as `Question` and
//! `QuestionOption` rows. Children always follow their container in the arena,
//! so a node's `parent` index is resolved before the node itself is written.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::aggregates::{Question, QuestionOption};
use crate::domain::value_objects::{OptionValue, QuestionType, RowId};
use crate::error::{FieldErrors, SurveyError, SurveyResult};
use crate::infrastructure::persistence::Tables;

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Largest scale a rating question may synthesize from `rateCount`.
pub const MAX_RATE_COUNT: u32 = 100;

/// Option synthesized for a question node.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionSpec {
    pub value: String,
    pub label: Option<String>,
    pub payload: OptionValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuestionNode {
    pub name: String,
    pub title: Option<String>,
    pub question_type: QuestionType,
    pub is_live: bool,
    /// Arena index of the container question.
    pub parent: Option<usize>,
    pub options: Vec<OptionSpec>,
}

/// Compiled question tree addressed by arena index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuestionTree {
    nodes: Vec<QuestionNode>,
}

impl QuestionTree {
    pub fn nodes(&self) -> &[QuestionNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<(usize, &QuestionNode)> {
        self.nodes.iter().enumerate().find(|(_, node)| node.name == name)
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &QuestionNode> {
        self.nodes
            .iter()
            .filter(move |node| node.parent == Some(index))
    }
}

#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub elements: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default, rename = "isLive")]
    is_live: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChoiceEntry {
    Pair {
        value: Value,
        #[serde(default)]
        text: Option<Value>,
    },
    Bare(Value),
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceFields {
    #[serde(default)]
    choices: Vec<ChoiceEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct BooleanFields {
    #[serde(default, rename = "labelTrue")]
    label_true: Option<Value>,
    #[serde(default, rename = "labelFalse")]
    label_false: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RateValue {
    Plain(i64),
    Entry {
        value: i64,
        #[serde(default)]
        text: Option<Value>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RatingFields {
    #[serde(default, rename = "rateValues")]
    rate_values: Vec<RateValue>,
    #[serde(default, rename = "rateCount")]
    rate_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ImageChoice {
    value: Value,
    #[serde(default, rename = "imageLink")]
    image_link: Option<String>,
    #[serde(default)]
    text: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ImagePickerFields {
    #[serde(default)]
    choices: Vec<ImageChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct MatrixFields {
    #[serde(default)]
    rows: Option<Value>,
    #[serde(default)]
    columns: Option<Value>,
    #[serde(default)]
    choices: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TextItem {
    name: String,
    #[serde(default)]
    title: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct MultipleTextFields {
    #[serde(default)]
    items: Vec<TextItem>,
}

#[derive(Debug, Default, Deserialize)]
struct PanelFields {
    #[serde(default)]
    elements: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DynamicPanelFields {
    #[serde(default, rename = "templateElements")]
    template_elements: Vec<Value>,
}

/// Compiles form definitions into question trees.
#[derive(Clone, Debug)]
pub struct QuestionCompiler {
    max_depth: usize,
}

impl Default for QuestionCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl QuestionCompiler {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Compile the `pages` of a full form definition.
    pub fn compile_definition(&self, definition: &Value) -> SurveyResult<QuestionTree> {
        let pages = pages_of(definition)?;
        self.compile(&pages)
    }

    pub fn compile(&self, pages: &[Page]) -> SurveyResult<QuestionTree> {
        let mut tree = QuestionTree::default();
        for page in pages {
            for element in &page.elements {
                self.compile_element(&mut tree, element, None, 1)?;
            }
        }
        Ok(tree)
    }

    fn compile_element(
        &self,
        tree: &mut QuestionTree,
        element: &Value,
        parent: Option<usize>,
        depth: usize,
    ) -> SurveyResult<()> {
        if depth > self.max_depth {
            return Err(SurveyError::QuestionTreeTooDeep { limit: self.max_depth });
        }

        let raw: RawElement = serde_json::from_value(element.clone())
            .map_err(|e| SurveyError::InvalidSchema(format!("malformed element: {}", e)))?;

        let question_type = match raw.kind.parse::<QuestionType>() {
            Ok(kind) => kind,
            Err(_) => {
                debug!(element_type = %raw.kind, "Skipping unsupported element type");
                return Ok(());
            }
        };

        let name = raw
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                SurveyError::InvalidSchema(format!("element of type '{}' has no name", raw.kind))
            })?;

        let options = self.options_for(question_type, &name, &raw.extra)?;

        let index = tree.nodes.len();
        tree.nodes.push(QuestionNode {
            name: name.clone(),
            title: raw.title.as_ref().and_then(display_text),
            question_type,
            is_live: raw.is_live,
            parent,
            options,
        });

        match question_type {
            QuestionType::Multipletext => {
                let fields: MultipleTextFields = fields_of(&name, &raw.extra)?;
                if !fields.items.is_empty() && depth + 1 > self.max_depth {
                    return Err(SurveyError::QuestionTreeTooDeep { limit: self.max_depth });
                }
                for item in fields.items {
                    tree.nodes.push(QuestionNode {
                        name: item.name,
                        title: item.title.as_ref().and_then(display_text),
                        question_type: QuestionType::Text,
                        is_live: false,
                        parent: Some(index),
                        options: Vec::new(),
                    });
                }
            }
            QuestionType::Panel => {
                let fields: PanelFields = fields_of(&name, &raw.extra)?;
                for nested in &fields.elements {
                    self.compile_element(tree, nested, Some(index), depth + 1)?;
                }
            }
            QuestionType::Paneldynamic => {
                let fields: DynamicPanelFields = fields_of(&name, &raw.extra)?;
                for nested in &fields.template_elements {
                    self.compile_element(tree, nested, Some(index), depth + 1)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn options_for(
        &self,
        question_type: QuestionType,
        name: &str,
        extra: &Map<String, Value>,
    ) -> SurveyResult<Vec<OptionSpec>> {
        let options = match question_type {
            QuestionType::Radiogroup
            | QuestionType::Ranking
            | QuestionType::Checkbox
            | QuestionType::Dropdown
            | QuestionType::Tagbox => {
                let fields: ChoiceFields = fields_of(name, extra)?;
                fields.choices.iter().map(choice_option).collect()
            }
            QuestionType::Boolean => {
                let fields: BooleanFields = fields_of(name, extra)?;
                let true_label = fields.label_true.as_ref().and_then(display_text);
                let false_label = fields.label_false.as_ref().and_then(display_text);
                vec![
                    OptionSpec {
                        value: "labelTrue".to_string(),
                        label: Some(true_label.unwrap_or_else(|| "Yes".to_string())),
                        payload: OptionValue::Boolean(true),
                    },
                    OptionSpec {
                        value: "labelFalse".to_string(),
                        label: Some(false_label.unwrap_or_else(|| "No".to_string())),
                        payload: OptionValue::Boolean(false),
                    },
                ]
            }
            QuestionType::Rating => {
                let fields: RatingFields = fields_of(name, extra)?;
                if fields.rate_values.is_empty() {
                    let count = fields.rate_count.unwrap_or(5);
                    if count > MAX_RATE_COUNT {
                        return Err(FieldErrors::single(
                            "rateCount",
                            format!("question '{}' may have at most {} rating steps", name, MAX_RATE_COUNT),
                        )
                        .into());
                    }
                    (1..=i64::from(count))
                        .map(|n| OptionSpec {
                            value: n.to_string(),
                            label: None,
                            payload: OptionValue::Numeric(n),
                        })
                        .collect()
                } else {
                    fields
                        .rate_values
                        .iter()
                        .map(|entry| match entry {
                            RateValue::Plain(n) => OptionSpec {
                                value: n.to_string(),
                                label: None,
                                payload: OptionValue::Numeric(*n),
                            },
                            RateValue::Entry { value, text } => OptionSpec {
                                value: value.to_string(),
                                label: text.as_ref().and_then(display_text),
                                payload: OptionValue::Numeric(*value),
                            },
                        })
                        .collect()
                }
            }
            QuestionType::Imagepicker => {
                let fields: ImagePickerFields = fields_of(name, extra)?;
                fields
                    .choices
                    .iter()
                    .map(|choice| OptionSpec {
                        value: scalar_text(&choice.value),
                        label: choice.text.as_ref().and_then(display_text),
                        payload: OptionValue::Image(choice.image_link.clone().unwrap_or_default()),
                    })
                    .collect()
            }
            QuestionType::Matrix | QuestionType::Matrixdropdown | QuestionType::Matrixdynamic => {
                let fields: MatrixFields = fields_of(name, extra)?;
                [
                    ("matrix_rows", fields.rows),
                    ("matrix_columns", fields.columns),
                    ("matrix_choices", fields.choices),
                ]
                .into_iter()
                .filter_map(|(key, value)| {
                    value.filter(is_meaningful).map(|value| OptionSpec {
                        value: key.to_string(),
                        label: None,
                        payload: OptionValue::Json(value),
                    })
                })
                .collect()
            }
            _ => Vec::new(),
        };

        Ok(options)
    }

    /// Write the tree under `form_id`. Returns row ids in arena order.
    pub fn persist(
        &self,
        tree: &QuestionTree,
        tables: &mut Tables,
        form_id: RowId,
    ) -> SurveyResult<Vec<RowId>> {
        if tables.form(form_id).is_none() {
            return Err(SurveyError::FormDoesNotExist);
        }

        let mut ids: Vec<RowId> = Vec::with_capacity(tree.len());
        for node in tree.nodes() {
            let parent_id = node
                .parent
                .map(|index| {
                    ids.get(index).copied().ok_or_else(|| {
                        SurveyError::Storage(format!("question '{}' precedes its container", node.name))
                    })
                })
                .transpose()?;

            let question_id = tables.insert_question(Question {
                id: 0,
                form_id,
                name: node.name.clone(),
                title: node.title.clone(),
                question_type: node.question_type,
                parent_id,
                is_live: node.is_live,
            })?;

            for option in &node.options {
                tables.insert_option(QuestionOption {
                    id: 0,
                    question_id,
                    value: option.value.clone(),
                    label: option.label.clone(),
                    payload: option.payload.clone(),
                })?;
            }

            ids.push(question_id);
        }

        Ok(ids)
    }
}

/// `pages` of a form definition; a definition without the key has no pages.
pub fn pages_of(definition: &Value) -> SurveyResult<Vec<Page>> {
    match definition.get("pages") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(pages) => serde_json::from_value(pages.clone())
            .map_err(|e| SurveyError::InvalidSchema(format!("malformed pages: {}", e))),
    }
}

/// Top-level `title` of a form definition.
pub fn definition_title(definition: &Value) -> Option<String> {
    definition.get("title").and_then(display_text)
}

fn fields_of<T: DeserializeOwned>(name: &str, extra: &Map<String, Value>) -> SurveyResult<T> {
    serde_json::from_value(Value::Object(extra.clone()))
        .map_err(|e| SurveyError::InvalidSchema(format!("element '{}': {}", name, e)))
}

fn choice_option(entry: &ChoiceEntry) -> OptionSpec {
    let (value, text) = match entry {
        ChoiceEntry::Pair { value, text } => (scalar_text(value), text.as_ref().and_then(display_text)),
        ChoiceEntry::Bare(value) => (scalar_text(value), None),
    };
    let text = text.unwrap_or_else(|| value.clone());

    OptionSpec {
        value,
        label: Some(text.clone()),
        payload: OptionValue::Text(text),
    }
}

/// Strings as-is, other scalars through their JSON rendering.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Plain or localized (`{"default": .., "fa": ..}`) display text.
fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(locales) => locales
            .get("default")
            .or_else(|| locales.values().next())
            .and_then(display_text),
        other => Some(other.to_string()),
    }
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
