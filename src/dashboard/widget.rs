use crate::schema::ColumnTypes;
use crate::schema::SemanticType;
use serde::Deserialize;
use serde::Serialize;

/// Rows per page of a table widget
const TABLE_PAGE_SIZE: u32 = 20;
/// At most this many KPI cards per sheet
const MAX_KPI_WIDGETS: usize = 3;
const BAR_COLOR: &str = "#228BE6";
const LINE_COLOR: &str = "#40C057";
const PIE_COLORS: [&str; 5] = ["#228BE6", "#40C057", "#FA5252", "#FD7E14", "#BE4BDB"];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    Sum,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Vertical,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Number,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub columns: Vec<String>,
    pub sortable: bool,
    pub filterable: bool,
    pub page_size: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiConfig {
    pub column: String,
    pub aggregation: Aggregation,
    pub label: String,
    pub format: ValueFormat,
    pub show_variation: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarChartConfig {
    pub x_axis: String,
    pub y_axis: String,
    pub aggregation: Aggregation,
    pub orientation: Orientation,
    pub color: String,
    pub show_grid: bool,
    pub show_legend: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChartConfig {
    pub x_axis: String,
    pub y_axis: String,
    pub aggregation: Aggregation,
    pub color: String,
    pub show_dots: bool,
    pub show_grid: bool,
    pub show_area: bool,
    pub smooth: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieChartConfig {
    pub category_column: String,
    pub value_column: String,
    pub aggregation: Aggregation,
    pub colors: Vec<String>,
    pub show_legend: bool,
    pub show_labels: bool,
    pub donut: bool,
}

/// Widget kind together with its configuration; serializes as
/// `"widget_type": "...", "config": {...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "widget_type", content = "config", rename_all = "snake_case")]
pub enum WidgetConfig {
    Table(TableConfig),
    Kpi(KpiConfig),
    BarChart(BarChartConfig),
    LineChart(LineChartConfig),
    PieChart(PieChartConfig),
}

impl WidgetConfig {
    pub const fn widget_type(&self) -> &'static str {
        match self {
            WidgetConfig::Table(_) => "table",
            WidgetConfig::Kpi(_) => "kpi",
            WidgetConfig::BarChart(_) => "bar_chart",
            WidgetConfig::LineChart(_) => "line_chart",
            WidgetConfig::PieChart(_) => "pie_chart",
        }
    }

    /// The configuration body alone, as stored with a materialized widget.
    pub fn to_value(&self) -> serde_json::Value {
        let value = match self {
            WidgetConfig::Table(config) => serde_json::to_value(config),
            WidgetConfig::Kpi(config) => serde_json::to_value(config),
            WidgetConfig::BarChart(config) => serde_json::to_value(config),
            WidgetConfig::LineChart(config) => serde_json::to_value(config),
            WidgetConfig::PieChart(config) => serde_json::to_value(config),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetSuggestion {
    pub title: String,
    pub table_name: String,
    #[serde(flatten)]
    pub config: WidgetConfig,
}

impl WidgetSuggestion {
    fn new(title: String, table_name: &str, config: WidgetConfig) -> Self {
        Self {
            title,
            table_name: table_name.to_owned(),
            config,
        }
    }

    pub fn widget_type(&self) -> &'static str {
        self.config.widget_type()
    }
}

/// Derives the ordered widget list for one sheet.
///
/// Always a table first, then up to three KPIs, then bar, line and pie charts when the
/// column mix allows. A sheet without numeric columns gets the table alone.
pub fn suggest_widgets(column_types: &ColumnTypes, table_name: &str, sheet_title: &str) -> Vec<WidgetSuggestion> {
    let mut suggestions = Vec::<WidgetSuggestion>::new();
    suggestions.push(WidgetSuggestion::new(
        sheet_title.to_owned(),
        table_name,
        WidgetConfig::Table(TableConfig {
            columns: column_types.names(),
            sortable: true,
            filterable: true,
            page_size: TABLE_PAGE_SIZE,
        }),
    ));

    let numeric: Vec<&str> = column_types
        .iter()
        .filter(|(_, kind)| kind.is_numeric())
        .map(|(name, _)| name)
        .collect();
    let first_numeric = match numeric.first() {
        Some(name) => *name,
        None => return suggestions,
    };
    let first_date = column_types.first_where(|kind| kind == SemanticType::Date);
    let first_string = column_types.first_where(|kind| kind == SemanticType::String);

    for column in numeric.iter().take(MAX_KPI_WIDGETS) {
        suggestions.push(WidgetSuggestion::new(
            format!("Total {column}"),
            table_name,
            WidgetConfig::Kpi(KpiConfig {
                column: column.to_string(),
                aggregation: Aggregation::Sum,
                label: humanize(column),
                format: ValueFormat::Number,
                show_variation: false,
            }),
        ));
    }

    if let Some(x_axis) = first_date.or(first_string) {
        suggestions.push(WidgetSuggestion::new(
            format!("{sheet_title} — Barras"),
            table_name,
            WidgetConfig::BarChart(BarChartConfig {
                x_axis: x_axis.to_owned(),
                y_axis: first_numeric.to_owned(),
                aggregation: Aggregation::Sum,
                orientation: Orientation::Vertical,
                color: BAR_COLOR.to_owned(),
                show_grid: true,
                show_legend: true,
            }),
        ));
    }

    if let Some(x_axis) = first_date {
        suggestions.push(WidgetSuggestion::new(
            format!("{sheet_title} — Tendencia"),
            table_name,
            WidgetConfig::LineChart(LineChartConfig {
                x_axis: x_axis.to_owned(),
                y_axis: first_numeric.to_owned(),
                aggregation: Aggregation::Sum,
                color: LINE_COLOR.to_owned(),
                show_dots: true,
                show_grid: true,
                show_area: false,
                smooth: false,
            }),
        ));
    }

    if let Some(category) = first_string {
        suggestions.push(WidgetSuggestion::new(
            format!("{sheet_title} — Distribución"),
            table_name,
            WidgetConfig::PieChart(PieChartConfig {
                category_column: category.to_owned(),
                value_column: first_numeric.to_owned(),
                aggregation: Aggregation::Sum,
                colors: PIE_COLORS.iter().map(|color| color.to_string()).collect(),
                show_legend: true,
                show_labels: true,
                donut: false,
            }),
        ));
    }

    suggestions
}

/// `total_ventas_2024` -> `Total Ventas 2024`: underscores to spaces, then every
/// alphabetic run starts upper case and continues lower case.
pub fn humanize(column: &str) -> String {
    let mut label = String::with_capacity(column.len());
    let mut in_word = false;
    for character in column.replace('_', " ").chars() {
        if character.is_alphabetic() {
            if in_word {
                label.extend(character.to_lowercase());
            } else {
                label.extend(character.to_uppercase());
            }
            in_word = true;
        } else {
            label.push(character);
            in_word = false;
        }
    }
    label
}
