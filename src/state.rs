use crate::{
    api::ApiClient, config::RuntimeConfiguration, data::RequestSequencer, error::PortalResult,
};
use maud::{DOCTYPE, Markup, html};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NavItem {
    Dashboard,
    Students,
    Drives,
    Reports,
}

impl NavItem {
    const ALL: [Self; 3] = [Self::Students, Self::Drives, Self::Reports];

    const fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Students => "/students",
            Self::Drives => "/drives",
            Self::Reports => "/reports",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Students => "Student Management",
            Self::Drives => "Drive Management",
            Self::Reports => "Reports",
        }
    }
}

fn render_nav(active: NavItem) -> Markup {
    html! {
        nav class="bg-gray-800 p-4 w-full" {
            div class="container mx-auto flex flex-row items-center justify-between" {
                a href=(NavItem::Dashboard.path()) class="text-xl font-bold font-mono tracking-widest hover:text-blue-300" {
                    "School Vaccination Portal"
                }
                div class="flex flex-row items-center space-x-4" {
                    @for item in NavItem::ALL {
                        @let classes = if item == active {
                            "bg-blue-600 py-2 px-4 rounded"
                        } else {
                            "border border-blue-600 hover:bg-gray-700 py-2 px-4 rounded"
                        };
                        a href=(item.path()) class=(classes) {(item.label())}
                    }
                    form method="post" action="/logout" {
                        button type="submit" aria-label="logout" class="text-gray-300 hover:text-white py-2 px-4" {"Logout"}
                    }
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct PortalState {
    api: ApiClient,
    config: RuntimeConfiguration,
    sequencer: Arc<RequestSequencer>,
}

impl PortalState {
    pub fn new(config: RuntimeConfiguration) -> PortalResult<Self> {
        let api = ApiClient::new(config.api_config())?;

        Ok(Self {
            api,
            config,
            sequencer: Arc::new(RequestSequencer::default()),
        })
    }

    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    /// Full page around `markup`. `active` is `None` for pages shown before sign-in, which get no nav.
    #[allow(clippy::unused_self)]
    pub fn render(&self, active: Option<NavItem>, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "School Vaccination Portal" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center text-white" {
                    @if let Some(active) = active {
                        (render_nav(active))
                    }
                    main class="w-full flex flex-col items-center p-8" {
                        (markup)
                    }
                    div id="dialog" {}
                    div id="toasts" class="fixed top-4 right-4 flex flex-col space-y-2 z-50" {}
                }
            }
        }
    }
}
