use shared::{
    domain::{Person, PersonDraft, PersonId},
    error::{ApiError, ApiException, ErrorCode},
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_persons(ctx: &ApiContext) -> Result<Vec<Person>, ApiError> {
    ctx.storage.list_persons().await.map_err(internal)
}

pub async fn get_person(ctx: &ApiContext, id: PersonId) -> Result<Person, ApiError> {
    ctx.storage
        .find_person(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(id))
}

pub async fn create_person(ctx: &ApiContext, draft: PersonDraft) -> Result<Person, ApiError> {
    let draft = validate_draft(draft)?;
    if ctx
        .storage
        .find_person_by_name(&draft.name)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(name_taken(&draft.name));
    }

    let person = ctx
        .storage
        .create_person(&draft)
        .await
        .map_err(|err| write_error(&draft.name, err))?;
    info!(person_id = person.id.0, "api: person created");
    Ok(person)
}

pub async fn update_person(
    ctx: &ApiContext,
    id: PersonId,
    draft: PersonDraft,
) -> Result<Person, ApiError> {
    let draft = validate_draft(draft)?;
    if let Some(other) = ctx
        .storage
        .find_person_by_name(&draft.name)
        .await
        .map_err(internal)?
    {
        if other.id != id {
            return Err(name_taken(&draft.name));
        }
    }

    let person = ctx
        .storage
        .update_person(id, &draft)
        .await
        .map_err(|err| write_error(&draft.name, err))?
        .ok_or_else(|| not_found(id))?;
    info!(person_id = person.id.0, "api: person updated");
    Ok(person)
}

pub async fn delete_person(ctx: &ApiContext, id: PersonId) -> Result<(), ApiError> {
    let removed = ctx.storage.delete_person(id).await.map_err(internal)?;
    if !removed {
        return Err(not_found(id));
    }
    info!(person_id = id.0, "api: person deleted");
    Ok(())
}

pub async fn info_text(ctx: &ApiContext) -> Result<String, ApiError> {
    let count = ctx.storage.count_persons().await.map_err(internal)?;
    Ok(format!("Phonebook has info for {count} people"))
}

fn validate_draft(draft: PersonDraft) -> Result<PersonDraft, ApiError> {
    let name = draft.name.trim().to_string();
    let number = draft.number.trim().to_string();
    if name.is_empty() {
        return Err(ApiException::validation("name missing").into());
    }
    if number.is_empty() {
        return Err(ApiException::validation("number missing").into());
    }
    Ok(PersonDraft { name, number })
}

fn name_taken(name: &str) -> ApiError {
    ApiException::validation(format!(
        "name must be unique: {name} is already in the phonebook"
    ))
    .into()
}

fn not_found(id: PersonId) -> ApiError {
    ApiException::not_found(format!("person {id} not found")).into()
}

/// A racing write can still trip the unique name index after the lookup passed.
fn write_error(name: &str, err: anyhow::Error) -> ApiError {
    if storage::is_unique_violation(&err) {
        name_taken(name)
    } else {
        internal(err)
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
