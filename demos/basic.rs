//! Minimal keel service: an in-memory notes API.
//!
//! Run with:
//!   LOG_FORMAT=text cargo run --example basic
//!
//! Try:
//!   curl -H 'x-request-id: 1' http://localhost:8080/api/notes
//!   curl -H 'x-request-id: 2' -X POST http://localhost:8080/api/notes \
//!        -d '{"title":"groceries","body":"milk"}'
//!   curl -H 'x-request-id: 3' -H 'accept-language: es' http://localhost:8080/api/notes/99
//!   curl -H 'x-request-id: 4' -H 'authorization: Bearer demo' \
//!        -X DELETE http://localhost:8080/api/notes/1

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use keel::middleware::{Middleware, Next};
use keel::{
    BoxError, BoxFuture, Config, Controller, DomainError, LocalizableError, Method, Principal, Request,
    Response, ResponseWriter, Route, Server, Status, Translator,
};
use serde::{Deserialize, Serialize};

#[tokio::main]
async fn main() -> Result<(), keel::Error> {
    let config = Config::from_env()?;
    keel::telemetry::init_logging(&config.logging);
    let translator = Translator::load_dir(&config.locales_dir, &config.locales)?;

    Server::new(config, translator)
        .auth(BearerAuth { token: "demo" })
        .controller(NotesController::default())
        .serve()
        .await
}

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Accepts exactly one static bearer token.
struct BearerAuth {
    token: &'static str,
}

impl Middleware for BearerAuth {
    fn execute<'a>(&'a self, mut req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let presented = req.header("authorization").and_then(|v| v.strip_prefix("Bearer "));
            if presented != Some(self.token) {
                let err = LocalizableError::new(
                    "unauthorized",
                    DomainError::Unauthorized.with_context("missing or invalid bearer token"),
                );
                return next.reject(req.context(), writer, err, Status::Unauthorized);
            }
            req.context_mut().set_principal(Principal::new("demo-user"));
            next.run(req, writer).await
        })
    }
}

// ── Notes ────────────────────────────────────────────────────────────────────

#[derive(Clone, Serialize)]
struct Note {
    id: u32,
    title: String,
    body: String,
}

#[derive(Deserialize)]
struct NewNote {
    title: String,
    body: String,
}

#[derive(Default)]
struct Store {
    next_id: u32,
    notes: BTreeMap<u32, Note>,
}

#[derive(Clone, Default)]
struct NotesController {
    store: Arc<Mutex<Store>>,
}

impl Controller for NotesController {
    fn routes(&self) -> Vec<Route> {
        let list = self.clone();
        let get = self.clone();
        let create = self.clone();
        let delete = self.clone();
        vec![
            Route::new(Method::Get, "/notes", move |req: Request| list.clone().list(req)),
            Route::new(Method::Get, "/notes/{id}", move |req: Request| get.clone().get(req)),
            Route::new(Method::Post, "/notes", move |req: Request| create.clone().create(req)),
            Route::new(Method::Delete, "/notes/{id}", move |req: Request| delete.clone().delete(req)).authenticated(),
        ]
    }
}

impl NotesController {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Store>, BoxError> {
        self.store
            .lock()
            .map_err(|_| DomainError::Internal.with_context("note store poisoned").into())
    }

    async fn list(self, _req: Request) -> Result<Response, BoxError> {
        let notes: Vec<Note> = self.lock()?.notes.values().cloned().collect();
        Ok(Response::json(notes))
    }

    async fn get(self, req: Request) -> Result<Response, BoxError> {
        let id = req.id_param("id")?;
        let note = self.lock()?.notes.get(&id).cloned().ok_or_else(|| {
            LocalizableError::new("notenotfound", DomainError::NotFound.with_context(format!("note {id}")))
        })?;
        Ok(Response::json(note))
    }

    async fn create(self, req: Request) -> Result<Response, BoxError> {
        let new: NewNote = req.json()?;
        if new.title.trim().is_empty() {
            return Err(DomainError::InvalidInput.with_context("title is empty").into());
        }

        let note = {
            let mut store = self.lock()?;
            if store.notes.values().any(|n| n.title == new.title) {
                return Err(LocalizableError::new("notetaken", DomainError::Conflict).into());
            }
            store.next_id += 1;
            let note = Note { id: store.next_id, title: new.title, body: new.body };
            store.notes.insert(note.id, note.clone());
            note
        };

        Ok(Response::builder()
            .status(Status::Created)
            .header("location", &format!("/api/notes/{}", note.id))
            .json(note))
    }

    async fn delete(self, req: Request) -> Result<Status, BoxError> {
        let id = req.id_param("id")?;
        let removed = self.lock()?.notes.remove(&id);
        match removed {
            Some(_) => Ok(Status::NoContent),
            None => Err(LocalizableError::new("notenotfound", DomainError::NotFound).into()),
        }
    }
}
