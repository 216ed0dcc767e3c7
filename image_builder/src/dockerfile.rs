use std::fmt::Write;

use crate::plugins::PluginSet;

/// Render the multi-stage Dockerfile for an engine image carrying the given
/// plugin set.
///
/// The builder stage compiles the engine with the requested output plugins;
/// the runtime stage is a minimal unprivileged image containing only the
/// resulting binary. Nothing is copied from a build context, so the rendered
/// string is the whole build input.
pub(crate) fn render(plugins: &PluginSet) -> String {
    let mut build_cmd = String::from("RUN CGO_ENABLED=0 xk6 build");
    for plugin in plugins.plugins() {
        write!(build_cmd, " \\\n  --with {}", plugin.module()).expect("write to String");
    }
    build_cmd.push_str(" \\\n  --output /tmp/k6");

    format!(
        r#"# -------- Builder stage --------
FROM golang:1.25-alpine AS builder

RUN apk --no-cache add git ca-certificates

RUN CGO_ENABLED=0 go install go.k6.io/xk6/cmd/xk6@latest

{build_cmd}

# -------- Runtime stage --------
FROM alpine:3.21

RUN apk add --no-cache ca-certificates && \
    adduser -D -u 12345 -g 12345 k6

COPY --from=builder /tmp/k6 /usr/bin/k6

USER 12345
WORKDIR /home/k6

ENTRYPOINT ["k6"]
"#
    )
}
