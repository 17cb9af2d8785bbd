use crate::data::FieldErrors;
use maud::{Markup, Render, html};

const INPUT_CLASSES: &str = "shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600 disabled:opacity-50";

pub fn render_table<const N: usize>(
    titles: [&'static str; N],
    items: Vec<[Markup; N]>,
    empty_message: &'static str,
) -> Markup {
    html! {
        div class="overflow-x-auto" {
            table class="min-w-full bg-gray-800 rounded shadow-md" {
                thead class="bg-gray-700" {
                    tr {
                        @for title in titles {
                            th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                        }
                    }
                }
                tbody {
                    @if items.is_empty() {
                        tr {
                            td colspan=(N) class="py-4 px-4 text-center text-gray-400" {(empty_message)}
                        }
                    }
                    @for row in items {
                        tr {
                            @for col in row {
                                td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

/// Hidden until htmx marks a request against it as in flight.
pub fn loading_indicator(id: &str) -> Markup {
    html! {
        span id=(id) class="htmx-indicator text-gray-400 text-sm ml-2" {"Loading..."}
    }
}

/// The generic label list panels show when their fetch failed.
pub fn error_label() -> Markup {
    html! {
        span class="text-red-400 font-semibold" {"Error"}
    }
}

fn field_error(errors: &FieldErrors, name: &str) -> Markup {
    html! {
        @if let Some(message) = errors.get(name) {
            p class="text-red-400 text-xs italic mt-1" {(message)}
        }
    }
}

pub struct InputField<'a> {
    pub name: &'static str,
    pub label: &'static str,
    pub value: &'a str,
    pub kind: &'static str,
    pub disabled: bool,
}

impl<'a> InputField<'a> {
    pub const fn text(name: &'static str, label: &'static str, value: &'a str) -> Self {
        Self {
            name,
            label,
            value,
            kind: "text",
            disabled: false,
        }
    }

    pub const fn of_kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A labelled input with its inline validation message, if any.
pub fn simple_form_element(field: &InputField<'_>, errors: &FieldErrors) -> Markup {
    html! {
        div class="mb-4" {
            label for=(field.name) class="block text-sm font-bold mb-2 text-gray-300" {(field.label)}
            input type=(field.kind) id=(field.name) name=(field.name) value=(field.value) disabled[field.disabled] class=(INPUT_CLASSES);
            @if field.disabled {
                // disabled inputs are not submitted
                input type="hidden" name=(field.name) value=(field.value);
            }
            (field_error(errors, field.name))
        }
    }
}

pub fn min_date_form_element(
    field: &InputField<'_>,
    min: &str,
    errors: &FieldErrors,
) -> Markup {
    html! {
        div class="mb-4" {
            label for=(field.name) class="block text-sm font-bold mb-2 text-gray-300" {(field.label)}
            input type="date" id=(field.name) name=(field.name) value=(field.value) min=(min) class=(INPUT_CLASSES);
            (field_error(errors, field.name))
        }
    }
}

pub struct SelectField<'a, I> {
    pub name: &'static str,
    pub label: &'static str,
    pub options: I,
    pub selected: &'a [&'a str],
    pub multiple: bool,
    pub disabled: bool,
    pub blank: Option<&'static str>,
}

pub fn select_element<I, O>(field: SelectField<'_, I>, errors: &FieldErrors) -> Markup
where
    I: IntoIterator<Item = O>,
    O: AsRef<str>,
{
    let options: Vec<O> = field.options.into_iter().collect();

    html! {
        div class="mb-4" {
            label for=(field.name) class="block text-sm font-bold mb-2 text-gray-300" {(field.label)}
            select id=(field.name) name=(field.name) multiple[field.multiple] disabled[field.disabled] class=(INPUT_CLASSES) {
                @if let Some(blank) = field.blank {
                    option value="" selected[field.selected.iter().all(|s| s.is_empty())] {(blank)}
                }
                @for choice in &options {
                    @let opt = choice.as_ref();
                    option value=(opt) selected[field.selected.contains(&opt)] {(opt)}
                }
            }
            @if field.disabled {
                @for selected in field.selected {
                    input type="hidden" name=(field.name) value=(selected);
                }
            }
            (field_error(errors, field.name))
        }
    }
}

pub fn form_submit_button(text: Option<&str>) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text.unwrap_or("Submit"))
            }
        }
    }
}

/// Modal shell that the `#dialog` container swaps in. Closing it swaps the empty fragment back.
pub fn dialog(heading: &str, body: Markup) -> Markup {
    html! {
        div class="fixed inset-0 bg-black/60 flex items-center justify-center z-40" {
            div class="bg-gray-800 rounded shadow-md p-6 w-full max-w-lg" {
                div class="flex flex-row justify-between items-start" {
                    (title(heading))
                    button type="button" class="text-gray-400 hover:text-white" hx-get="/internal/empty" hx-target="#dialog" {"✕"}
                }
                (body)
            }
        }
    }
}

/// Previous/next pager. `include` names the form whose inputs ride along with each page change.
pub fn pagination(path: &str, target: &str, include: Option<&str>, page: u32, page_count: u64) -> Markup {
    let page_count = page_count.max(1);
    let has_previous = page > 1;
    let has_next = u64::from(page) < page_count;

    html! {
        div class="flex flex-row items-center justify-end space-x-4 mt-4" {
            button class="bg-gray-700 hover:bg-gray-600 py-1 px-3 rounded disabled:opacity-50"
                disabled[!has_previous] hx-get=(path) hx-target=(target) hx-include=[include]
                hx-vals={"{\"page\": " (page.saturating_sub(1).max(1)) "}"} {"Previous"}
            span class="text-gray-300" {"Page " (page) " of " (page_count)}
            button class="bg-gray-700 hover:bg-gray-600 py-1 px-3 rounded disabled:opacity-50"
                disabled[!has_next] hx-get=(path) hx-target=(target) hx-include=[include]
                hx-vals={"{\"page\": " (page.saturating_add(1)) "}"} {"Next"}
        }
    }
}
