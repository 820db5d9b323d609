use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

impl ServiceContext {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_values(
            component,
            env::var("SERVICE_NAME").ok(),
            env::var("STAGE").ok(),
        )
    }

    fn from_values(
        component: &str,
        service_name: Option<String>,
        environment: Option<String>,
    ) -> Self {
        let component = component.trim().to_string();

        let service_name = non_blank(service_name).unwrap_or_else(|| component.clone());
        let environment = non_blank(environment).unwrap_or_else(|| "unknown".to_string());

        Self {
            service_name,
            environment,
            component,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_component_and_unknown_stage() {
        let context = ServiceContext::from_values(" backend ", None, Some("  ".to_string()));

        assert_eq!(context.component, "backend");
        assert_eq!(context.service_name, "backend");
        assert_eq!(context.environment, "unknown");
    }

    #[test]
    fn uses_explicit_values() {
        let context = ServiceContext::from_values(
            "backend",
            Some("newsdash".to_string()),
            Some("production".to_string()),
        );

        assert_eq!(context.service_name, "newsdash");
        assert_eq!(context.environment, "production");
    }
}
